//! Argument packs - contiguous slot buffers in call order
//!
//! Design: each wire representation knows how many slots it occupies
//! (`WireValue::SLOTS`) and writes itself verbatim. An argument tuple's
//! total slot count is the compile-time sum over its element types.

use super::slot::WireSlot;
use crate::boundary::RawRef;
use core::ffi::c_void;
use smallvec::SmallVec;

/// Inline capacity; longer argument lists spill to the heap
const INLINE_SLOTS: usize = 8;

/// Contiguous buffer of wire slots for one boundary call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WirePack {
    slots: SmallVec<[WireSlot; INLINE_SLOTS]>,
}

impl WirePack {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pack sized for an argument list known to need `slots` slots
    #[inline]
    pub fn with_capacity(slots: usize) -> Self {
        Self {
            slots: SmallVec::with_capacity(slots),
        }
    }

    /// Append one slot
    #[inline]
    pub fn push(&mut self, slot: WireSlot) {
        self.slots.push(slot);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// View handed to the boundary primitive
    #[inline]
    pub fn as_slice(&self) -> &[WireSlot] {
        &self.slots
    }
}

/// A wire representation that can be written into a pack
pub trait WireValue: Sized {
    /// Number of consecutive slots this representation occupies
    const SLOTS: usize;

    /// Store `self` verbatim at the end of `pack`
    fn write(self, pack: &mut WirePack);
}

/// A wire representation that fits in (and can be read from) one slot
///
/// Boundary results are always a single slot, so only these
/// representations can be returned from the foreign side.
pub trait SingleSlot: WireValue {
    fn read(slot: WireSlot) -> Self;
}

impl WireValue for () {
    const SLOTS: usize = 0;

    #[inline]
    fn write(self, _pack: &mut WirePack) {}
}

impl SingleSlot for () {
    #[inline]
    fn read(_slot: WireSlot) -> Self {}
}

impl WireValue for u32 {
    const SLOTS: usize = 1;

    #[inline]
    fn write(self, pack: &mut WirePack) {
        pack.push(WireSlot::from_u32(self));
    }
}

impl SingleSlot for u32 {
    #[inline]
    fn read(slot: WireSlot) -> Self {
        slot.as_u32()
    }
}

impl WireValue for u64 {
    const SLOTS: usize = 1;

    #[inline]
    fn write(self, pack: &mut WirePack) {
        pack.push(WireSlot::from_u64(self));
    }
}

impl SingleSlot for u64 {
    #[inline]
    fn read(slot: WireSlot) -> Self {
        slot.as_u64()
    }
}

impl WireValue for f32 {
    const SLOTS: usize = 1;

    #[inline]
    fn write(self, pack: &mut WirePack) {
        pack.push(WireSlot::from_f32(self));
    }
}

impl SingleSlot for f32 {
    #[inline]
    fn read(slot: WireSlot) -> Self {
        slot.as_f32()
    }
}

impl WireValue for f64 {
    const SLOTS: usize = 1;

    #[inline]
    fn write(self, pack: &mut WirePack) {
        pack.push(WireSlot::from_f64(self));
    }
}

impl SingleSlot for f64 {
    #[inline]
    fn read(slot: WireSlot) -> Self {
        slot.as_f64()
    }
}

impl WireValue for *const c_void {
    const SLOTS: usize = 1;

    #[inline]
    fn write(self, pack: &mut WirePack) {
        pack.push(WireSlot::from_ptr(self));
    }
}

impl SingleSlot for *const c_void {
    #[inline]
    fn read(slot: WireSlot) -> Self {
        slot.as_ptr()
    }
}

impl WireValue for RawRef {
    const SLOTS: usize = 1;

    #[inline]
    fn write(self, pack: &mut WirePack) {
        pack.push(WireSlot::from_u32(self.bits()));
    }
}

impl SingleSlot for RawRef {
    #[inline]
    fn read(slot: WireSlot) -> Self {
        RawRef::from_bits(slot.as_u32())
    }
}
