//! Statistics Dispatch
//!
//! An object type opts into runtime statistics by registering with a
//! [`StatsDescriptor`]: the exact sizes of its raw and query buffers plus
//! up to five callbacks. Each instance then binds its own counter block
//! with [`ObjectRegistry::stats_register`], and callers read or control
//! those counters through the registry, which validates the request before
//! routing it to the type's callback.
//!
//! ## Per-core state
//!
//! ```text
//! Unregistered --stats_register--> Registered --stats_deregister--> Unregistered
//! ```
//!
//! Whether gathering is enabled is not tracked here; `stats_enable` and
//! `stats_disable` only forward to the type's callbacks.
//!
//! ## Result precedence
//!
//! 1. No descriptor, or no callback for the operation: `NotSupported`
//! 2. Wrong buffer length, or nothing registered: `InvalidArgument`
//! 3. Otherwise `Ok` with the callback's own status
//!
//! Callbacks run inside the registry's critical section. They must be
//! short, must not block, and must not call back into the registry.

use core::any::Any;
use core::fmt;

use bitflags::bitflags;

use crate::handle::ObjectCore;
use crate::registry::ObjectRegistry;
use crate::{ObjCoreError, Result};

/// Copies raw or query statistics for `core` into `out`
///
/// `out` always has exactly the size declared in the descriptor.
pub type ReadFn = fn(core: ObjectCore, stats: StatsRef, out: &mut [u8]) -> i32;

/// Resets, enables or disables statistics gathering for `core`
pub type ControlFn = fn(core: ObjectCore, stats: StatsRef) -> i32;

/// Reference to a kernel object's raw statistics block
///
/// The block is owned by the kernel object; this subsystem only stores
/// the reference and checks its size. Callbacks recover the concrete
/// counter type with [`downcast`](Self::downcast). Blocks are shared with
/// the code that updates them, so counters are normally atomics.
///
/// The block must be `'static`. Kernel objects whose counters live on the
/// stack or in a heap allocation that can be freed cannot register
/// statistics; such objects keep their counters in a static table and
/// register an entry of it.
#[derive(Clone, Copy)]
pub struct StatsRef(&'static (dyn Any + Send + Sync));

impl StatsRef {
    pub fn new<T: Any + Send + Sync>(stats: &'static T) -> Self {
        Self(stats)
    }

    /// Size of the referenced block in bytes
    pub fn byte_len(&self) -> usize {
        core::mem::size_of_val(self.0)
    }

    pub fn downcast<T: Any>(&self) -> Option<&'static T> {
        let stats: &'static (dyn Any + Send + Sync) = self.0;
        stats.downcast_ref::<T>()
    }

    /// Whether both references point at the same block
    pub fn same_block(&self, other: &StatsRef) -> bool {
        core::ptr::eq(
            self.0 as *const _ as *const (),
            other.0 as *const _ as *const (),
        )
    }
}

impl fmt::Debug for StatsRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatsRef")
            .field("addr", &(self.0 as *const _ as *const ()))
            .field("len", &self.byte_len())
            .finish()
    }
}

bitflags! {
    /// Statistics operations an object type implements
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct StatsCaps: u8 {
        const RAW = 1 << 0;
        const QUERY = 1 << 1;
        const RESET = 1 << 2;
        const ENABLE = 1 << 3;
        const DISABLE = 1 << 4;
    }
}

/// Statistics protocol of one object type
#[derive(Clone, Copy)]
pub struct StatsDescriptor {
    /// Exact size of the raw statistics block and of raw read buffers
    pub raw_size: usize,
    /// Exact size of query result buffers
    pub query_size: usize,
    pub raw: Option<ReadFn>,
    pub query: Option<ReadFn>,
    pub reset: Option<ControlFn>,
    pub enable: Option<ControlFn>,
    pub disable: Option<ControlFn>,
}

impl StatsDescriptor {
    /// Descriptor with the given sizes and no callbacks
    pub const fn new(raw_size: usize, query_size: usize) -> Self {
        Self {
            raw_size,
            query_size,
            raw: None,
            query: None,
            reset: None,
            enable: None,
            disable: None,
        }
    }

    pub const fn with_raw(mut self, raw: ReadFn) -> Self {
        self.raw = Some(raw);
        self
    }

    pub const fn with_query(mut self, query: ReadFn) -> Self {
        self.query = Some(query);
        self
    }

    pub const fn with_reset(mut self, reset: ControlFn) -> Self {
        self.reset = Some(reset);
        self
    }

    pub const fn with_enable(mut self, enable: ControlFn) -> Self {
        self.enable = Some(enable);
        self
    }

    pub const fn with_disable(mut self, disable: ControlFn) -> Self {
        self.disable = Some(disable);
        self
    }

    pub fn caps(&self) -> StatsCaps {
        let mut caps = StatsCaps::empty();
        caps.set(StatsCaps::RAW, self.raw.is_some());
        caps.set(StatsCaps::QUERY, self.query.is_some());
        caps.set(StatsCaps::RESET, self.reset.is_some());
        caps.set(StatsCaps::ENABLE, self.enable.is_some());
        caps.set(StatsCaps::DISABLE, self.disable.is_some());
        caps
    }
}

impl fmt::Debug for StatsDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatsDescriptor")
            .field("raw_size", &self.raw_size)
            .field("query_size", &self.query_size)
            .field("caps", &self.caps())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReadOp {
    Raw,
    Query,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ControlOp {
    Reset,
    Enable,
    Disable,
}

/// Validate and route a raw/query read. Caller holds the registry lock.
pub(crate) fn dispatch_read(
    desc: Option<&StatsDescriptor>,
    op: ReadOp,
    core: ObjectCore,
    stats: Option<StatsRef>,
    out: &mut [u8],
) -> Result<i32> {
    let desc = desc.ok_or(ObjCoreError::NotSupported)?;
    let (read, size) = match op {
        ReadOp::Raw => (desc.raw, desc.raw_size),
        ReadOp::Query => (desc.query, desc.query_size),
    };
    let read = read.ok_or(ObjCoreError::NotSupported)?;

    if out.len() != size {
        return Err(ObjCoreError::InvalidArgument);
    }
    let stats = stats.ok_or(ObjCoreError::InvalidArgument)?;

    Ok(read(core, stats, out))
}

/// Validate and route a reset/enable/disable. Caller holds the registry lock.
pub(crate) fn dispatch_control(
    desc: Option<&StatsDescriptor>,
    op: ControlOp,
    core: ObjectCore,
    stats: Option<StatsRef>,
) -> Result<i32> {
    let desc = desc.ok_or(ObjCoreError::NotSupported)?;
    let control = match op {
        ControlOp::Reset => desc.reset,
        ControlOp::Enable => desc.enable,
        ControlOp::Disable => desc.disable,
    }
    .ok_or(ObjCoreError::NotSupported)?;
    let stats = stats.ok_or(ObjCoreError::InvalidArgument)?;

    Ok(control(core, stats))
}

impl<const MAX_TYPES: usize, const MAX_CORES: usize> ObjectRegistry<MAX_TYPES, MAX_CORES> {
    /// Register a kernel object's raw statistics block
    ///
    /// Registering starts statistics gathering for the instance. A block
    /// registered earlier is replaced.
    ///
    /// # Errors
    /// - `NotSupported` if the core's type has no statistics descriptor
    /// - `InvalidArgument` if the block size differs from `raw_size`; the
    ///   previous registration, if any, is kept
    pub fn stats_register(&self, core: ObjectCore, stats: StatsRef) -> Result<()> {
        let mut state = self.lock();
        let index = state.check(core);
        let ty = state.cores[index].type_index as usize;
        let desc = state.types[ty].stats.ok_or(ObjCoreError::NotSupported)?;

        if stats.byte_len() != desc.raw_size {
            return Err(ObjCoreError::InvalidArgument);
        }
        state.cores[index].stats = Some(stats);
        Ok(())
    }

    /// Drop a kernel object's statistics registration
    ///
    /// Succeeds even if nothing was registered.
    ///
    /// # Errors
    /// `NotSupported` if the core's type has no statistics descriptor
    pub fn stats_deregister(&self, core: ObjectCore) -> Result<()> {
        let mut state = self.lock();
        let index = state.check(core);
        let ty = state.cores[index].type_index as usize;
        if state.types[ty].stats.is_none() {
            return Err(ObjCoreError::NotSupported);
        }
        state.cores[index].stats = None;
        Ok(())
    }

    /// Currently registered statistics block, if any
    pub fn registered_stats(&self, core: ObjectCore) -> Option<StatsRef> {
        self.lock().core_slot(core).stats
    }

    /// Copy the raw statistics of `core` into `out`
    ///
    /// `out.len()` must equal the type's `raw_size`.
    pub fn stats_raw(&self, core: ObjectCore, out: &mut [u8]) -> Result<i32> {
        self.read(core, ReadOp::Raw, out)
    }

    /// Copy the normalized statistics of `core` into `out`
    ///
    /// `out.len()` must equal the type's `query_size`.
    pub fn stats_query(&self, core: ObjectCore, out: &mut [u8]) -> Result<i32> {
        self.read(core, ReadOp::Query, out)
    }

    pub fn stats_reset(&self, core: ObjectCore) -> Result<i32> {
        self.control(core, ControlOp::Reset)
    }

    /// Resume statistics gathering after `stats_disable`
    pub fn stats_enable(&self, core: ObjectCore) -> Result<i32> {
        self.control(core, ControlOp::Enable)
    }

    /// Pause statistics gathering
    pub fn stats_disable(&self, core: ObjectCore) -> Result<i32> {
        self.control(core, ControlOp::Disable)
    }

    fn read(&self, core: ObjectCore, op: ReadOp, out: &mut [u8]) -> Result<i32> {
        let state = self.lock();
        let slot = state.core_slot(core);
        let desc = state.types[slot.type_index as usize].stats.as_ref();
        dispatch_read(desc, op, core, slot.stats, out)
    }

    fn control(&self, core: ObjectCore, op: ControlOp) -> Result<i32> {
        let state = self.lock();
        let slot = state.core_slot(core);
        let desc = state.types[slot.type_index as usize].stats.as_ref();
        dispatch_control(desc, op, core, slot.stats)
    }
}
