//! Object Core - per-instance handle
//!
//! Every kernel object that takes part in introspection embeds one
//! [`ObjectCore`]. The handle names a slot in the registry's core table;
//! the slot records the object's type, whether it is linked into the
//! type's instance list, the owning object's [`OwnerKey`] and any
//! registered statistics buffer.
//!
//! ## Lifecycle
//!
//! ```text
//! UNINIT --init_core--> detached <--link/unlink--> linked
//!                          |                          |
//!                          +-------release_core-------+--> (handle stale)
//! ```
//!
//! `unlink` is idempotent; `link` is not, and linking a core that is
//! already linked is a caller bug.

use static_assertions::assert_eq_size;

use crate::config::NIL;
use crate::registry::{CoreSlot, ObjectRegistry, RegistryState, TypeHandle};
use crate::{ObjCoreError, Result};

/// Handle embedded in a kernel object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectCore {
    slot: u32,
    generation: u32,
}

assert_eq_size!(ObjectCore, u64);

impl ObjectCore {
    /// Placeholder for a kernel object that has not been initialized yet.
    /// Any registry operation on it panics.
    pub const UNINIT: Self = Self {
        slot: NIL,
        generation: 0,
    };

    pub(crate) const fn from_parts(slot: u32, generation: u32) -> Self {
        Self { slot, generation }
    }

    pub const fn is_initialized(&self) -> bool {
        self.slot != NIL
    }
}

impl Default for ObjectCore {
    fn default() -> Self {
        Self::UNINIT
    }
}

/// Stable identifier of the kernel object that owns a core
///
/// Typically an index into the owner's own object table. Tools map a
/// visited core back to its owning object through this key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OwnerKey(pub usize);

impl<const MAX_TYPES: usize, const MAX_CORES: usize> RegistryState<MAX_TYPES, MAX_CORES> {
    /// Validate a type handle and return its type table index
    pub(crate) fn check_type(&self, ty: TypeHandle) -> usize {
        assert!(
            ty.index() < self.type_count,
            "object type {:?} not registered",
            ty
        );
        ty.index()
    }

    /// Validate a handle and return its slot index
    pub(crate) fn check(&self, core: ObjectCore) -> usize {
        assert!(core.is_initialized(), "object core not initialized");
        let index = core.slot as usize;
        let slot = &self.cores[index];
        assert!(
            slot.live && slot.generation == core.generation,
            "stale object core handle {:?}",
            core
        );
        index
    }

    pub(crate) fn core_slot(&self, core: ObjectCore) -> &CoreSlot {
        &self.cores[self.check(core)]
    }
}

impl<const MAX_TYPES: usize, const MAX_CORES: usize> ObjectRegistry<MAX_TYPES, MAX_CORES> {
    /// Initialize an object core for a kernel object of type `ty`
    ///
    /// The new core starts detached and with no statistics registered.
    ///
    /// # Arguments
    /// * `ty` - Type of the owning kernel object
    /// * `owner` - Key that identifies the owning kernel object
    ///
    /// # Errors
    /// Returns `CoreTableFull` when every core slot is in use
    ///
    /// # Panics
    /// If `ty` was not returned by this registry's `register_type`
    pub fn init_core(&self, ty: TypeHandle, owner: OwnerKey) -> Result<ObjectCore> {
        let mut state = self.lock();
        state.check_type(ty);

        let index = if state.free_head != NIL {
            let index = state.free_head;
            state.free_head = state.cores[index as usize].free_next;
            index
        } else if (state.high_water as usize) < MAX_CORES {
            let index = state.high_water;
            state.high_water += 1;
            index
        } else {
            drop(state);
            log::warn!("Cannot initialize object core for {:?}: core table full", owner);
            return Err(ObjCoreError::CoreTableFull {
                capacity: MAX_CORES,
            });
        };

        let slot = &mut state.cores[index as usize];
        *slot = CoreSlot {
            live: true,
            generation: slot.generation,
            type_index: ty.0,
            owner,
            ..CoreSlot::VACANT
        };
        let core = ObjectCore::from_parts(index, slot.generation);
        state.live_cores += 1;

        log::trace!("Initialized object core {:?} for {:?}", core, owner);
        Ok(core)
    }

    /// Link a core into its type's instance list, making it enumerable
    ///
    /// # Panics
    /// If the core is uninitialized, released, or already linked
    pub fn link(&self, core: ObjectCore) {
        let mut state = self.lock();
        let index = state.check(core);
        assert!(
            !state.cores[index].linked,
            "object core {:?} already linked",
            core
        );
        self.list_append(&mut state, index as u32);
        log::trace!("Linked object core {:?}", core);
    }

    /// Unlink a core from its type's instance list
    ///
    /// Does nothing if the core is not linked, so it is safe to call
    /// unconditionally on teardown.
    pub fn unlink(&self, core: ObjectCore) {
        let mut state = self.lock();
        let index = state.check(core);
        if state.cores[index].linked {
            self.list_remove(&mut state, index as u32);
            log::trace!("Unlinked object core {:?}", core);
        }
    }

    pub fn is_linked(&self, core: ObjectCore) -> bool {
        self.lock().core_slot(core).linked
    }

    /// Type the core was initialized with
    pub fn core_type(&self, core: ObjectCore) -> TypeHandle {
        TypeHandle(self.lock().core_slot(core).type_index)
    }

    /// Recover the owning kernel object's key from its core
    pub fn owner(&self, core: ObjectCore) -> OwnerKey {
        self.lock().core_slot(core).owner
    }

    /// Release a core at the end of its kernel object's life
    ///
    /// Unlinks the core if needed, drops any statistics registration and
    /// returns the slot to the free list. The handle is stale afterwards.
    pub fn release_core(&self, core: ObjectCore) {
        let mut state = self.lock();
        let index = state.check(core);
        if state.cores[index].linked {
            self.list_remove(&mut state, index as u32);
        }

        let free_head = state.free_head;
        let slot = &mut state.cores[index];
        *slot = CoreSlot {
            generation: slot.generation.wrapping_add(1),
            free_next: free_head,
            ..CoreSlot::VACANT
        };
        state.free_head = index as u32;
        state.live_cores -= 1;

        log::trace!("Released object core {:?}", core);
    }
}
