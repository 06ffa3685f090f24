//! Compile-time configuration
//!
//! Table capacities are const generic parameters of
//! [`ObjectRegistry`](crate::ObjectRegistry); these are the defaults used
//! when a registry is named without explicit capacities.

use static_assertions::const_assert;

/// Default number of object types a registry can hold
pub const DEFAULT_MAX_TYPES: usize = 32;

/// Default number of object cores a registry can hold
pub const DEFAULT_MAX_CORES: usize = 256;

/// Link sentinel: "no slot"
pub(crate) const NIL: u32 = u32::MAX;

// Slot indices are stored as u32 with NIL reserved.
const_assert!(DEFAULT_MAX_CORES < NIL as usize);
const_assert!(DEFAULT_MAX_TYPES < NIL as usize);
