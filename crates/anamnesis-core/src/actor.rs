//! Actors: entries of the game's actor table and the marshalers bound to them.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

use crate::error::Result;
use crate::marshal::Marshaler;
use crate::offset::{Offset, OffsetChain};
use crate::service::MarshalerService;

/// Size of one actor table entry (a pointer).
pub const ACTOR_SLOT_SIZE: u64 = 8;

/// An array of actor pointers at a fixed module offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorTable {
    base: Offset,
}

impl ActorTable {
    pub fn new(base: Offset) -> Self {
        Self { base }
    }

    /// Base offset of the actor in slot `index`.
    pub fn slot(&self, index: usize) -> Offset {
        let name = format!("{}[{}]", self.base.name().unwrap_or("ActorTable"), index);
        self.base
            .shifted((index as u64).wrapping_mul(ACTOR_SLOT_SIZE))
            .named(name)
    }
}

/// Retargeting operations erased over the marshaler's value type.
trait Retarget: Send + Sync {
    fn retarget(&self, base: Offset) -> Result<()>;
    fn dispose(&self);
    fn is_active(&self) -> bool;
}

impl<T: Clone + Send + Sync + 'static> Retarget for Marshaler<T> {
    fn retarget(&self, base: Offset) -> Result<()> {
        Marshaler::retarget(self, base)
    }

    fn dispose(&self) {
        Marshaler::dispose(self);
    }

    fn is_active(&self) -> bool {
        Marshaler::is_active(self)
    }
}

/// One in-game actor. Owns the marshalers created through it so that they
/// can follow the actor when it moves to another table slot.
pub struct Actor {
    base: Mutex<Offset>,
    owned: Mutex<Vec<Arc<dyn Retarget>>>,
}

impl Actor {
    pub fn new(base: Offset) -> Self {
        Self {
            base: Mutex::new(base),
            owned: Mutex::new(Vec::new()),
        }
    }

    pub fn base(&self) -> Offset {
        self.base.lock().clone()
    }

    /// Bind a marshaler to `offsets`, relative to this actor.
    pub fn bind<T>(&self, service: &MarshalerService, offsets: &[Offset]) -> Result<Marshaler<T>>
    where
        T: Clone + Send + Sync + 'static,
    {
        let mut chain = OffsetChain::new(self.base());
        for offset in offsets {
            chain = chain.then(offset.clone());
        }

        let marshaler = service.marshaler::<T>(chain)?;
        self.owned.lock().push(Arc::new(marshaler.clone()));
        Ok(marshaler)
    }

    /// Point every owned marshaler at `base`. All marshalers are attempted;
    /// the first failure is returned.
    pub fn retarget(&self, base: Offset) -> Result<()> {
        *self.base.lock() = base.clone();

        let mut owned = self.owned.lock();
        owned.retain(|m| m.is_active());

        let mut first_error = None;
        for marshaler in owned.iter() {
            if let Err(e) = marshaler.retarget(base.clone()) {
                warn!("Failed to retarget marshaler: {}", e);
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Number of owned marshalers that are still active.
    pub fn bound_count(&self) -> usize {
        self.owned.lock().iter().filter(|m| m.is_active()).count()
    }

    pub fn dispose(&self) {
        let owned: Vec<_> = self.owned.lock().drain(..).collect();
        for marshaler in owned {
            marshaler.dispose();
        }
    }
}

impl Drop for Actor {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Vector;
    use crate::config::ServiceConfig;
    use crate::error::Error;
    use crate::memory::MockProcess;

    const BASE: u64 = 0x1000;
    const TABLE: u64 = 0x100;

    fn service() -> (Arc<MockProcess>, MarshalerService) {
        let process = Arc::new(
            MockProcess::builder()
                .base_address(BASE)
                .write_u64(BASE + TABLE, 0x2000)
                .write_u64(BASE + TABLE + 8, 0x3000)
                .write_u64(BASE + TABLE + 16, 0)
                .map(0x2000, 0x100)
                .map(0x3000, 0x100)
                .write_f32s(0x2050, &[1.0, 2.0, 3.0])
                .write_f32s(0x3050, &[4.0, 5.0, 6.0])
                .build(),
        );
        let service = MarshalerService::new(process.clone(), ServiceConfig::default());
        (process, service)
    }

    fn table() -> ActorTable {
        ActorTable::new(Offset::from(TABLE).named("ActorTable"))
    }

    #[test]
    fn test_slot_offsets() {
        let table = table();
        assert_eq!(table.slot(0).values(), &[TABLE]);
        assert_eq!(table.slot(2).values(), &[TABLE + 16]);
        assert_eq!(table.slot(2).name(), Some("ActorTable[2]"));
    }

    #[test]
    fn test_slot_with_huge_index_wraps() {
        let slot = table().slot(usize::MAX);
        let expected = TABLE.wrapping_add((usize::MAX as u64).wrapping_mul(ACTOR_SLOT_SIZE));
        assert_eq!(slot.values(), &[expected]);
    }

    #[test]
    fn test_bind_and_retarget() {
        let (_process, service) = service();
        let table = table();
        let actor = Actor::new(table.slot(0));

        let position = actor
            .bind::<Vector>(&service, &[Offset::from(0x50).named("Position")])
            .unwrap();
        assert_eq!(position.value().unwrap(), Vector { x: 1.0, y: 2.0, z: 3.0 });
        assert_eq!(position.name(), "ActorTable[0], Position");

        actor.retarget(table.slot(1)).unwrap();
        assert_eq!(position.address(), 0x3050);
        assert_eq!(actor.base(), table.slot(1));
    }

    #[test]
    fn test_retarget_to_empty_slot_reports_error() {
        let (_process, service) = service();
        let table = table();
        let actor = Actor::new(table.slot(0));
        let position = actor.bind::<Vector>(&service, &[Offset::from(0x50)]).unwrap();
        let scale = actor.bind::<f32>(&service, &[Offset::from(0x58)]).unwrap();

        let result = actor.retarget(table.slot(2));
        assert!(matches!(result, Err(Error::InvalidAddress { .. })));
        // Both marshalers stay at the old, valid address.
        assert_eq!(position.address(), 0x2050);
        assert_eq!(scale.address(), 0x2058);
    }

    #[test]
    fn test_dispose_releases_marshalers() {
        let (_process, service) = service();
        let actor = Actor::new(table().slot(0));
        let position = actor.bind::<Vector>(&service, &[Offset::from(0x50)]).unwrap();
        assert_eq!(actor.bound_count(), 1);

        drop(actor);
        assert!(!position.is_active());
        assert_eq!(service.live_count(), 0);
    }
}
