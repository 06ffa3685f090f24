//! Object Type Registry
//!
//! The registry owns every table of the subsystem behind a single spinlock:
//! object types in registration order, and the object core slots whose
//! links thread each type's instance list. Types are append-only; once
//! registered they stay until the registry itself is dropped, which for
//! the kernel's `static` registry means never.

use core::sync::atomic::{AtomicU32, Ordering};
use spin::{Mutex, MutexGuard};

use crate::config::{DEFAULT_MAX_CORES, DEFAULT_MAX_TYPES, NIL};
use crate::handle::OwnerKey;
use crate::stats::{StatsCaps, StatsDescriptor, StatsRef};
use crate::type_id::ObjectTypeId;
use crate::{ObjCoreError, Result};

/// Handle to a registered object type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeHandle(pub(crate) u32);

impl TypeHandle {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Snapshot of one object type, for tooling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeInfo {
    pub id: ObjectTypeId,
    /// Instances currently linked into the type's list
    pub instances: usize,
    pub stats_caps: StatsCaps,
    /// Raw statistics buffer size, if the type supports statistics
    pub raw_size: Option<usize>,
    /// Query result size, if the type supports statistics
    pub query_size: Option<usize>,
}

#[derive(Clone, Copy)]
pub(crate) struct TypeSlot {
    pub(crate) id: ObjectTypeId,
    pub(crate) stats: Option<StatsDescriptor>,
    pub(crate) head: u32,
    pub(crate) tail: u32,
    pub(crate) len: usize,
}

impl TypeSlot {
    const EMPTY: Self = Self {
        id: ObjectTypeId::new(0),
        stats: None,
        head: NIL,
        tail: NIL,
        len: 0,
    };
}

#[derive(Clone, Copy)]
pub(crate) struct CoreSlot {
    pub(crate) live: bool,
    /// Bumped on release so that old handles are detected
    pub(crate) generation: u32,
    pub(crate) type_index: u32,
    pub(crate) owner: OwnerKey,
    pub(crate) linked: bool,
    pub(crate) prev: u32,
    pub(crate) free_next: u32,
    pub(crate) stats: Option<StatsRef>,
}

impl CoreSlot {
    pub(crate) const VACANT: Self = Self {
        live: false,
        generation: 0,
        type_index: NIL,
        owner: OwnerKey(0),
        linked: false,
        prev: NIL,
        free_next: NIL,
        stats: None,
    };
}

/// Everything guarded by the registry lock
pub(crate) struct RegistryState<const MAX_TYPES: usize, const MAX_CORES: usize> {
    pub(crate) types: [TypeSlot; MAX_TYPES],
    pub(crate) type_count: usize,
    pub(crate) cores: [CoreSlot; MAX_CORES],
    /// Slots at or above this index have never been handed out
    pub(crate) high_water: u32,
    /// Released slots, chained through `free_next`
    pub(crate) free_head: u32,
    pub(crate) live_cores: usize,
}

impl<const MAX_TYPES: usize, const MAX_CORES: usize> RegistryState<MAX_TYPES, MAX_CORES> {
    const fn new() -> Self {
        Self {
            types: [TypeSlot::EMPTY; MAX_TYPES],
            type_count: 0,
            cores: [CoreSlot::VACANT; MAX_CORES],
            high_water: 0,
            free_head: NIL,
            live_cores: 0,
        }
    }

    pub(crate) fn type_slot(&self, ty: TypeHandle) -> &TypeSlot {
        &self.types[self.check_type(ty)]
    }
}

/// Object type registry and instance tables
///
/// One critical section covers the whole registry: the type list, every
/// instance list and every core's statistics binding. The lock is a
/// spinlock and is never held across anything that can block.
///
/// Capacities are fixed at compile time, so a registry can live in a
/// `static`:
///
/// ```
/// use obj_core::{ObjectRegistry, ObjectTypeId};
///
/// static REGISTRY: ObjectRegistry = ObjectRegistry::new();
///
/// let thread = REGISTRY
///     .register_type(ObjectTypeId::from_fourcc(b"THRD"), None)
///     .unwrap();
/// assert_eq!(REGISTRY.find_type(ObjectTypeId::from_fourcc(b"THRD")), Some(thread));
/// ```
pub struct ObjectRegistry<
    const MAX_TYPES: usize = DEFAULT_MAX_TYPES,
    const MAX_CORES: usize = DEFAULT_MAX_CORES,
> {
    state: Mutex<RegistryState<MAX_TYPES, MAX_CORES>>,
    /// Successor links of the instance lists. Written only with the lock
    /// held; the unlocked walk reads them without it.
    pub(crate) next: [AtomicU32; MAX_CORES],
}

impl<const MAX_TYPES: usize, const MAX_CORES: usize> ObjectRegistry<MAX_TYPES, MAX_CORES> {
    /// Create an empty registry
    pub const fn new() -> Self {
        assert!(MAX_TYPES < NIL as usize && MAX_CORES < NIL as usize);
        Self {
            state: Mutex::new(RegistryState::new()),
            next: [const { AtomicU32::new(NIL) }; MAX_CORES],
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, RegistryState<MAX_TYPES, MAX_CORES>> {
        self.state.lock()
    }

    /// Register an object type
    ///
    /// Appends the type to the registry list. IDs are not checked for
    /// uniqueness; with duplicates, [`find_type`](Self::find_type) returns
    /// the one registered first.
    ///
    /// # Arguments
    /// * `id` - Type tag, usually a four-character mnemonic
    /// * `stats` - Statistics descriptor, if the type supports statistics
    ///
    /// # Errors
    /// Returns `TypeTableFull` once `MAX_TYPES` types are registered
    pub fn register_type(
        &self,
        id: ObjectTypeId,
        stats: Option<StatsDescriptor>,
    ) -> Result<TypeHandle> {
        let mut state = self.lock();
        let index = state.type_count;
        if index == MAX_TYPES {
            drop(state);
            log::warn!("Cannot register object type {}: type table full", id);
            return Err(ObjCoreError::TypeTableFull {
                capacity: MAX_TYPES,
            });
        }

        state.types[index] = TypeSlot {
            id,
            stats,
            ..TypeSlot::EMPTY
        };
        state.type_count += 1;
        drop(state);

        log::debug!(
            "Registered object type {} (slot {}, stats: {})",
            id,
            index,
            stats.is_some()
        );
        Ok(TypeHandle(index as u32))
    }

    /// Find a registered object type by ID
    pub fn find_type(&self, id: ObjectTypeId) -> Option<TypeHandle> {
        let state = self.lock();
        state.types[..state.type_count]
            .iter()
            .position(|ty| ty.id == id)
            .map(|index| TypeHandle(index as u32))
    }

    /// All registered types, in registration order
    ///
    /// Types registered after this call are not included.
    pub fn types(&self) -> impl Iterator<Item = TypeHandle> {
        (0..self.type_count() as u32).map(TypeHandle)
    }

    pub fn type_count(&self) -> usize {
        self.lock().type_count
    }

    /// Number of initialized (not yet released) object cores
    pub fn core_count(&self) -> usize {
        self.lock().live_cores
    }

    pub fn type_id(&self, ty: TypeHandle) -> ObjectTypeId {
        self.lock().type_slot(ty).id
    }

    pub fn stats_descriptor(&self, ty: TypeHandle) -> Option<StatsDescriptor> {
        self.lock().type_slot(ty).stats
    }

    /// Snapshot a type's identity, instance count and statistics support
    pub fn type_info(&self, ty: TypeHandle) -> TypeInfo {
        let state = self.lock();
        let slot = state.type_slot(ty);
        TypeInfo {
            id: slot.id,
            instances: slot.len,
            stats_caps: slot
                .stats
                .as_ref()
                .map_or(StatsCaps::empty(), StatsDescriptor::caps),
            raw_size: slot.stats.map(|desc| desc.raw_size),
            query_size: slot.stats.map(|desc| desc.query_size),
        }
    }

    /// Append a core slot to the tail of its type's list
    pub(crate) fn list_append(&self, state: &mut RegistryState<MAX_TYPES, MAX_CORES>, slot: u32) {
        let index = slot as usize;
        let ty = state.cores[index].type_index as usize;
        let tail = state.types[ty].tail;

        self.next[index].store(NIL, Ordering::Release);
        state.cores[index].prev = tail;
        if tail == NIL {
            state.types[ty].head = slot;
        } else {
            self.next[tail as usize].store(slot, Ordering::Release);
        }
        state.types[ty].tail = slot;
        state.types[ty].len += 1;
        state.cores[index].linked = true;
    }

    /// Remove a linked core slot from its type's list
    pub(crate) fn list_remove(&self, state: &mut RegistryState<MAX_TYPES, MAX_CORES>, slot: u32) {
        let index = slot as usize;
        let ty = state.cores[index].type_index as usize;
        let prev = state.cores[index].prev;
        let next = self.next[index].load(Ordering::Relaxed);

        if prev == NIL {
            state.types[ty].head = next;
        } else {
            self.next[prev as usize].store(next, Ordering::Release);
        }
        if next == NIL {
            state.types[ty].tail = prev;
        } else {
            state.cores[next as usize].prev = prev;
        }

        // A detached node has no successor: an unlocked walk parked on it
        // ends here.
        self.next[index].store(NIL, Ordering::Release);
        state.cores[index].prev = NIL;
        state.cores[index].linked = false;
        state.types[ty].len -= 1;
    }
}

impl<const MAX_TYPES: usize, const MAX_CORES: usize> Default
    for ObjectRegistry<MAX_TYPES, MAX_CORES>
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::type_id::well_known;

    #[test]
    fn test_register_and_find() {
        let registry: ObjectRegistry<8, 8> = ObjectRegistry::new();

        let thread = registry.register_type(well_known::THREAD, None).unwrap();
        let sem = registry.register_type(well_known::SEM, None).unwrap();

        assert_eq!(registry.find_type(well_known::THREAD), Some(thread));
        assert_eq!(registry.find_type(well_known::SEM), Some(sem));
        assert_eq!(registry.find_type(well_known::MUTEX), None);
        assert_eq!(registry.type_id(sem), well_known::SEM);
        assert_eq!(registry.type_count(), 2);
    }

    #[test]
    fn test_duplicate_id_first_match_wins() {
        let registry: ObjectRegistry<8, 8> = ObjectRegistry::new();

        let first = registry.register_type(well_known::FIFO, None).unwrap();
        let second = registry.register_type(well_known::FIFO, None).unwrap();

        assert_ne!(first, second);
        assert_eq!(registry.find_type(well_known::FIFO), Some(first));
    }

    #[test]
    fn test_type_table_full() {
        let registry: ObjectRegistry<2, 4> = ObjectRegistry::new();

        registry.register_type(well_known::PIPE, None).unwrap();
        registry.register_type(well_known::MBOX, None).unwrap();

        assert_eq!(
            registry.register_type(well_known::MSGQ, None),
            Err(ObjCoreError::TypeTableFull { capacity: 2 })
        );
        assert_eq!(registry.find_type(well_known::MSGQ), None);
    }

    #[test]
    fn test_types_in_registration_order() {
        let registry: ObjectRegistry<8, 8> = ObjectRegistry::new();
        let ids = [well_known::CPU, well_known::KERNEL, well_known::TIMER];
        for id in ids {
            registry.register_type(id, None).unwrap();
        }

        let listed: std::vec::Vec<_> = registry.types().map(|ty| registry.type_id(ty)).collect();
        assert_eq!(listed, ids);
    }

    #[test]
    fn test_type_info() {
        let registry: ObjectRegistry<8, 8> = ObjectRegistry::new();
        let plain = registry.register_type(well_known::STACK, None).unwrap();

        let info = registry.type_info(plain);
        assert_eq!(info.id, well_known::STACK);
        assert_eq!(info.instances, 0);
        assert!(info.stats_caps.is_empty());
        assert_eq!(info.raw_size, None);
        assert_eq!(info.query_size, None);
    }

    #[test]
    #[should_panic(expected = "not registered")]
    fn test_unregistered_handle_is_fatal() {
        let registry: ObjectRegistry<8, 8> = ObjectRegistry::new();
        registry.type_id(TypeHandle(3));
    }
}
