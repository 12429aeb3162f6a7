//! Wire slot - the 8-byte transport unit
//!
//! Layout: one untagged union, 8 bytes, 8-byte aligned. A slot carries a
//! single scalar, pointer or handle; memory views span two slots.

use core::ffi::c_void;
use core::fmt;

/// Fixed-width transport cell for one argument or return value
///
/// Every constructor starts from an all-zero slot, so all 8 bytes are
/// always initialised and any field may be read back.
#[repr(C, align(8))]
#[derive(Clone, Copy)]
pub union WireSlot {
    words: [u32; 2],
    single: f32,
    double: f64,
    bits: u64,
    ptr: *const c_void,
}

const _: () = assert!(core::mem::size_of::<WireSlot>() == 8);
const _: () = assert!(core::mem::align_of::<WireSlot>() == 8);

impl WireSlot {
    /// All-zero slot
    pub const ZERO: Self = Self { bits: 0 };

    /// Slot holding a 32-bit word (high word zero)
    #[inline]
    pub const fn from_u32(value: u32) -> Self {
        Self { words: [value, 0] }
    }

    /// Slot holding two 32-bit words (memory view descriptors)
    #[inline]
    pub const fn from_words(low: u32, high: u32) -> Self {
        Self { words: [low, high] }
    }

    /// Slot holding a 64-bit bit pattern
    #[inline]
    pub const fn from_u64(value: u64) -> Self {
        Self { bits: value }
    }

    /// Slot holding a single-precision float (high word zero)
    #[inline]
    pub fn from_f32(value: f32) -> Self {
        let mut slot = Self::ZERO;
        slot.single = value;
        slot
    }

    /// Slot holding a double-precision float
    #[inline]
    pub const fn from_f64(value: f64) -> Self {
        Self { double: value }
    }

    /// Slot holding a pointer (upper bytes zero on 32-bit targets)
    #[inline]
    pub fn from_ptr(value: *const c_void) -> Self {
        let mut slot = Self::ZERO;
        slot.ptr = value;
        slot
    }

    /// First 32-bit word
    #[inline]
    pub fn as_u32(self) -> u32 {
        // SAFETY: all 8 bytes are initialised and every bit pattern is a valid [u32; 2]
        unsafe { self.words[0] }
    }

    /// Both 32-bit words
    #[inline]
    pub fn words(self) -> [u32; 2] {
        // SAFETY: see `as_u32`
        unsafe { self.words }
    }

    /// Full 64-bit pattern
    #[inline]
    pub fn as_u64(self) -> u64 {
        // SAFETY: see `as_u32`
        unsafe { self.bits }
    }

    #[inline]
    pub fn as_f32(self) -> f32 {
        // SAFETY: see `as_u32`; any bit pattern is a valid f32
        unsafe { self.single }
    }

    #[inline]
    pub fn as_f64(self) -> f64 {
        // SAFETY: see `as_u32`; any bit pattern is a valid f64
        unsafe { self.double }
    }

    /// Pointer payload. Dereferencing it is the reader's responsibility.
    #[inline]
    pub fn as_ptr(self) -> *const c_void {
        // SAFETY: see `as_u32`; raw pointers have no validity invariant
        unsafe { self.ptr }
    }
}

impl Default for WireSlot {
    #[inline]
    fn default() -> Self {
        Self::ZERO
    }
}

impl PartialEq for WireSlot {
    fn eq(&self, other: &Self) -> bool {
        self.as_u64() == other.as_u64()
    }
}

impl Eq for WireSlot {}

impl fmt::Debug for WireSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WireSlot({:#018x})", self.as_u64())
    }
}
