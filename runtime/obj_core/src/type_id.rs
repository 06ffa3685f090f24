//! Object type identifiers
//!
//! Types are tagged with a 32-bit value, conventionally four ASCII
//! characters packed big-endian (`b"THRD"` is `0x5448_5244`).

use core::fmt;
use static_assertions::{assert_eq_size, const_assert_eq};

/// 32-bit tag identifying a kind of kernel object
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ObjectTypeId(u32);

assert_eq_size!(ObjectTypeId, u32);

impl ObjectTypeId {
    /// Wrap a raw 32-bit tag
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Pack a four-character mnemonic, first character in the high byte
    pub const fn from_fourcc(tag: &[u8; 4]) -> Self {
        Self(u32::from_be_bytes(*tag))
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub const fn fourcc(self) -> [u8; 4] {
        self.0.to_be_bytes()
    }
}

impl fmt::Display for ObjectTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = self.fourcc();
        if tag.iter().all(|b| b.is_ascii_graphic()) {
            for &b in &tag {
                write!(f, "{}", b as char)?;
            }
            Ok(())
        } else {
            write!(f, "{:#010x}", self.0)
        }
    }
}

impl fmt::Debug for ObjectTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectTypeId({})", self)
    }
}

impl From<u32> for ObjectTypeId {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

/// Tags of the kernel's own object kinds
pub mod well_known {
    use super::ObjectTypeId;

    pub const CONDVAR: ObjectTypeId = ObjectTypeId::from_fourcc(b"COND");
    pub const CPU: ObjectTypeId = ObjectTypeId::from_fourcc(b"CPU_");
    pub const EVENT: ObjectTypeId = ObjectTypeId::from_fourcc(b"EVNT");
    pub const FIFO: ObjectTypeId = ObjectTypeId::from_fourcc(b"FIFO");
    pub const KERNEL: ObjectTypeId = ObjectTypeId::from_fourcc(b"KRNL");
    pub const LIFO: ObjectTypeId = ObjectTypeId::from_fourcc(b"LIFO");
    pub const MEM_BLOCK: ObjectTypeId = ObjectTypeId::from_fourcc(b"MBLK");
    pub const MBOX: ObjectTypeId = ObjectTypeId::from_fourcc(b"MBOX");
    pub const MEM_SLAB: ObjectTypeId = ObjectTypeId::from_fourcc(b"SLAB");
    pub const MSGQ: ObjectTypeId = ObjectTypeId::from_fourcc(b"MSGQ");
    pub const MUTEX: ObjectTypeId = ObjectTypeId::from_fourcc(b"MUTX");
    pub const PIPE: ObjectTypeId = ObjectTypeId::from_fourcc(b"PIPE");
    pub const SEM: ObjectTypeId = ObjectTypeId::from_fourcc(b"SEM4");
    pub const STACK: ObjectTypeId = ObjectTypeId::from_fourcc(b"STCK");
    pub const THREAD: ObjectTypeId = ObjectTypeId::from_fourcc(b"THRD");
    pub const TIMER: ObjectTypeId = ObjectTypeId::from_fourcc(b"TIMR");
}

const_assert_eq!(well_known::THREAD.raw(), 0x5448_5244);
const_assert_eq!(well_known::KERNEL.raw(), 0x4b52_4e4c);
const_assert_eq!(well_known::SEM.raw(), 0x5345_4d34);
