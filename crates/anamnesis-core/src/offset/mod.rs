mod chain;
mod resolver;
mod signature;
mod table;

pub use chain::*;
pub use resolver::*;
pub use signature::*;
pub use table::*;
