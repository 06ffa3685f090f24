//! Traversal Engine - enumerating a type's instances
//!
//! Two walks over an object type's instance list, both driven by a
//! visitor that returns [`ControlFlow`]. `Break` stops the walk and
//! becomes its result; a walk that runs off the end (or starts on an
//! empty list) returns `Continue(())`.
//!
//! - **Locked walk**: one critical section for the whole traversal. The
//!   list cannot change underneath the visitor, at the price of holding
//!   the lock for as long as the walk takes.
//! - **Unlocked walk**: the successor of each element is captured before
//!   the lock is taken for that element, and the lock is held only while
//!   the visitor runs on it. Each visit sees a consistent core, but the
//!   walk as a whole does not see a snapshot: elements linked or unlinked
//!   concurrently may be skipped or included, an element unlinked after
//!   its successor was captured is skipped, and if that element was the
//!   one the walk was parked on, the walk ends early.
//!
//! In both walks the visitor runs with the registry locked and must not
//! call back into the registry. It can read statistics of the visited
//! core through [`CoreVisit`].

use core::ops::ControlFlow;
use core::sync::atomic::Ordering;

use crate::config::NIL;
use crate::handle::{ObjectCore, OwnerKey};
use crate::registry::{ObjectRegistry, RegistryState, TypeHandle};
use crate::stats::{dispatch_read, ReadOp, StatsDescriptor, StatsRef};
use crate::type_id::ObjectTypeId;
use crate::Result;

/// View of one core handed to a walk visitor
pub struct CoreVisit<'a> {
    core: ObjectCore,
    owner: OwnerKey,
    type_id: ObjectTypeId,
    stats: Option<StatsRef>,
    descriptor: Option<&'a StatsDescriptor>,
}

impl<'a> CoreVisit<'a> {
    fn new<const MAX_TYPES: usize, const MAX_CORES: usize>(
        state: &'a RegistryState<MAX_TYPES, MAX_CORES>,
        index: usize,
    ) -> Self {
        let slot = &state.cores[index];
        let ty = &state.types[slot.type_index as usize];
        Self {
            core: ObjectCore::from_parts(index as u32, slot.generation),
            owner: slot.owner,
            type_id: ty.id,
            stats: slot.stats,
            descriptor: ty.stats.as_ref(),
        }
    }

    pub fn core(&self) -> ObjectCore {
        self.core
    }

    /// Key of the kernel object embedding this core
    pub fn owner(&self) -> OwnerKey {
        self.owner
    }

    pub fn type_id(&self) -> ObjectTypeId {
        self.type_id
    }

    pub fn stats(&self) -> Option<StatsRef> {
        self.stats
    }

    /// Same as [`ObjectRegistry::stats_raw`], without re-taking the lock
    pub fn stats_raw(&self, out: &mut [u8]) -> Result<i32> {
        dispatch_read(self.descriptor, ReadOp::Raw, self.core, self.stats, out)
    }

    /// Same as [`ObjectRegistry::stats_query`], without re-taking the lock
    pub fn stats_query(&self, out: &mut [u8]) -> Result<i32> {
        dispatch_read(self.descriptor, ReadOp::Query, self.core, self.stats, out)
    }
}

impl<const MAX_TYPES: usize, const MAX_CORES: usize> ObjectRegistry<MAX_TYPES, MAX_CORES> {
    /// Visit every instance of `ty` under a single critical section
    ///
    /// Instances are visited in link order. No instance of any type can be
    /// linked, unlinked or have its statistics changed until the walk
    /// returns, so a slow visitor delays the whole system.
    pub fn walk_locked<B, F>(&self, ty: TypeHandle, mut visitor: F) -> ControlFlow<B>
    where
        F: FnMut(&CoreVisit<'_>) -> ControlFlow<B>,
    {
        let state = self.lock();
        let mut cursor = state.type_slot(ty).head;

        while cursor != NIL {
            let index = cursor as usize;
            if let ControlFlow::Break(result) = visitor(&CoreVisit::new(&*state, index)) {
                return ControlFlow::Break(result);
            }
            cursor = self.next[index].load(Ordering::Relaxed);
        }

        ControlFlow::Continue(())
    }

    /// Visit the instances of `ty`, locking once per instance
    ///
    /// See the module documentation for the consistency this gives. The
    /// walk takes at most `MAX_CORES` steps, so it terminates even while
    /// the list keeps changing.
    pub fn walk_unlocked<B, F>(&self, ty: TypeHandle, mut visitor: F) -> ControlFlow<B>
    where
        F: FnMut(&CoreVisit<'_>) -> ControlFlow<B>,
    {
        let mut cursor = self.lock().type_slot(ty).head;

        for _ in 0..MAX_CORES {
            if cursor == NIL {
                break;
            }
            let index = cursor as usize;
            let successor = self.next[index].load(Ordering::Acquire);

            let state = self.lock();
            let slot = &state.cores[index];
            if slot.live && slot.linked && slot.type_index == ty.0 {
                if let ControlFlow::Break(result) = visitor(&CoreVisit::new(&*state, index)) {
                    return ControlFlow::Break(result);
                }
            }
            drop(state);

            cursor = successor;
        }

        ControlFlow::Continue(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::type_id::well_known;
    use std::vec::Vec;

    fn populated(count: usize) -> (ObjectRegistry<4, 16>, TypeHandle, Vec<ObjectCore>) {
        let registry = ObjectRegistry::new();
        let ty = registry.register_type(well_known::MEM_SLAB, None).unwrap();
        let cores = (0..count)
            .map(|i| {
                let core = registry.init_core(ty, OwnerKey(i)).unwrap();
                registry.link(core);
                core
            })
            .collect();
        (registry, ty, cores)
    }

    fn owners_locked(registry: &ObjectRegistry<4, 16>, ty: TypeHandle) -> Vec<usize> {
        let mut seen = Vec::new();
        let _ = registry.walk_locked::<(), _>(ty, |visit| {
            seen.push(visit.owner().0);
            ControlFlow::Continue(())
        });
        seen
    }

    fn owners_unlocked(registry: &ObjectRegistry<4, 16>, ty: TypeHandle) -> Vec<usize> {
        let mut seen = Vec::new();
        let _ = registry.walk_unlocked::<(), _>(ty, |visit| {
            seen.push(visit.owner().0);
            ControlFlow::Continue(())
        });
        seen
    }

    #[test]
    fn test_empty_list_never_visits() {
        let (registry, ty, _) = populated(0);
        let mut calls = 0;

        let locked = registry.walk_locked::<i32, _>(ty, |_| {
            calls += 1;
            ControlFlow::Break(1)
        });
        let unlocked = registry.walk_unlocked::<i32, _>(ty, |_| {
            calls += 1;
            ControlFlow::Break(1)
        });

        assert_eq!(locked, ControlFlow::Continue(()));
        assert_eq!(unlocked, ControlFlow::Continue(()));
        assert_eq!(calls, 0);
    }

    #[test]
    fn test_walks_visit_in_link_order() {
        let (registry, ty, _) = populated(5);
        assert_eq!(owners_locked(&registry, ty), [0, 1, 2, 3, 4]);
        assert_eq!(owners_unlocked(&registry, ty), [0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_walks_stop_on_break() {
        let (registry, ty, _) = populated(6);

        for k in 1..=6 {
            let mut visited = 0;
            let result = registry.walk_locked(ty, |_| {
                visited += 1;
                if visited == k {
                    ControlFlow::Break(k * 10)
                } else {
                    ControlFlow::Continue(())
                }
            });
            assert_eq!(result, ControlFlow::Break(k * 10));
            assert_eq!(visited, k);

            let mut visited = 0;
            let result = registry.walk_unlocked(ty, |_| {
                visited += 1;
                if visited == k {
                    ControlFlow::Break(k * 10)
                } else {
                    ControlFlow::Continue(())
                }
            });
            assert_eq!(result, ControlFlow::Break(k * 10));
            assert_eq!(visited, k);
        }
    }

    #[test]
    fn test_unlink_middle_head_tail() {
        let (registry, ty, cores) = populated(5);

        registry.unlink(cores[2]);
        assert_eq!(owners_locked(&registry, ty), [0, 1, 3, 4]);

        registry.unlink(cores[0]);
        registry.unlink(cores[4]);
        assert_eq!(owners_locked(&registry, ty), [1, 3]);

        // Relinking appends at the tail
        registry.link(cores[0]);
        assert_eq!(owners_unlocked(&registry, ty), [1, 3, 0]);
    }

    #[test]
    fn test_walk_only_sees_own_type() {
        let (registry, slab, _) = populated(2);
        let timer = registry.register_type(well_known::TIMER, None).unwrap();
        let core = registry.init_core(timer, OwnerKey(99)).unwrap();
        registry.link(core);

        assert_eq!(owners_locked(&registry, slab), [0, 1]);
        assert_eq!(owners_locked(&registry, timer), [99]);
    }

    #[test]
    fn test_visit_reports_core_and_type() {
        let (registry, ty, cores) = populated(1);
        let _ = registry.walk_locked::<(), _>(ty, |visit| {
            assert_eq!(visit.core(), cores[0]);
            assert_eq!(visit.type_id(), well_known::MEM_SLAB);
            assert!(visit.stats().is_none());
            ControlFlow::Continue(())
        });
    }

    #[test]
    fn test_detached_node_has_no_successor() {
        let (registry, ty, cores) = populated(3);

        // An unlocked walk on the head captures cores[1] as its successor;
        // once cores[1] is unlinked it leads nowhere.
        let head = registry.lock().type_slot(ty).head as usize;
        let parked = registry.next[head].load(Ordering::Acquire);
        registry.unlink(cores[1]);

        assert_eq!(registry.next[parked as usize].load(Ordering::Acquire), NIL);
        assert_eq!(owners_unlocked(&registry, ty), [0, 2]);
    }
}
