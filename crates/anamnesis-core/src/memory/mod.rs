mod process;

#[cfg(target_os = "windows")]
mod win32;
#[cfg(target_os = "windows")]
pub use win32::ProcessHandle;

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "linux")]
pub use linux::ProcessHandle;

#[cfg(not(any(target_os = "windows", target_os = "linux")))]
mod unsupported;
#[cfg(not(any(target_os = "windows", target_os = "linux")))]
pub use unsupported::ProcessHandle;

// In-memory process image for testing (always available for unit and integration tests)
#[doc(hidden)]
pub mod mock;

pub use process::ProcessMemory;

#[doc(hidden)]
pub use mock::{MockProcess, MockProcessBuilder};
