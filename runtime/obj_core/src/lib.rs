//! Object Core - Kernel object introspection for KaaL
//!
//! # Purpose
//! Lets arbitrary kernel primitives (threads, semaphores, memory slabs,
//! per-CPU structures, the kernel itself) register under a small object
//! type taxonomy, be enumerated by debugging and monitoring tools, and
//! optionally expose a uniform runtime-statistics protocol.
//!
//! # Integration Points
//! - Depends on: nothing but a spinlock
//! - Provides to: kernel objects (lifecycle), tooling (enumeration, stats)
//! - Capabilities required: none
//!
//! # Architecture
//! An [`ObjectRegistry`] owns two fixed-size tables behind one spinlock:
//! the object types, in registration order, and the object core slots.
//! Each type keeps a doubly-linked list of its linked instances threaded
//! through the core slots. Kernel objects embed an [`ObjectCore`] handle
//! and drive it through `init_core` / `link` / `unlink` / `release_core`.
//! Tooling finds types by [`ObjectTypeId`] and walks their instances with
//! either the locked walk (consistent snapshot) or the unlocked walk
//! (per-element critical sections).
//!
//! Every operation on the registry, including statistics callbacks, runs
//! inside the same critical section. Callbacks and walk visitors must be
//! short and must not call back into the registry.
//!
//! # Testing Strategy
//! - Unit tests: registry, lifecycle, walks and stats gating per module
//! - Integration tests: end-to-end scenarios with mock kernel objects,
//!   concurrent link/unlink against the unlocked walk

#![no_std]

#[cfg(test)]
#[macro_use]
extern crate std;

pub mod config;
mod handle;
mod registry;
pub mod stats;
pub mod type_id;
mod walk;

pub use config::{DEFAULT_MAX_CORES, DEFAULT_MAX_TYPES};
pub use handle::{ObjectCore, OwnerKey};
pub use registry::{ObjectRegistry, TypeHandle, TypeInfo};
pub use stats::{ControlFn, ReadFn, StatsCaps, StatsDescriptor, StatsRef};
pub use type_id::ObjectTypeId;
pub use walk::CoreVisit;

use thiserror::Error;

/// Error types for object core operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ObjCoreError {
    /// The object type does not implement the requested statistics
    /// capability (no descriptor, or no callback for this operation).
    #[error("Operation not supported by object type")]
    NotSupported,

    /// The capability exists but the call is malformed: buffer length
    /// mismatch, or no statistics buffer registered for the instance.
    #[error("Invalid argument")]
    InvalidArgument,

    #[error("Object type table full ({capacity} types)")]
    TypeTableFull { capacity: usize },

    #[error("Object core table full ({capacity} cores)")]
    CoreTableFull { capacity: usize },
}

pub type Result<T> = core::result::Result<T, ObjCoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            format!("{}", ObjCoreError::NotSupported),
            "Operation not supported by object type"
        );
        assert_eq!(
            format!("{}", ObjCoreError::CoreTableFull { capacity: 4 }),
            "Object core table full (4 cores)"
        );
    }
}
