//! Composite wire representations - strings and memory views
//!
//! Strings enter the runtime as foreign string handles and come back as a
//! pointer to a runtime-owned UTF-8 buffer that lives until the call's
//! cleanup token runs. Memory views are a descriptor slot plus a data
//! pointer slot.

use super::pack::{SingleSlot, WirePack, WireValue};
use super::slot::WireSlot;
use crate::boundary::RawRef;
use core::ffi::c_void;

/// Runtime-owned byte buffer referenced by a returned text slot
#[repr(C)]
#[derive(Debug)]
pub struct WireBuffer {
    data: *const u8,
    len: usize,
}

impl WireBuffer {
    /// Describe `bytes`; the owner must keep them alive while the buffer is read
    pub fn describe(bytes: &[u8]) -> Self {
        Self {
            data: bytes.as_ptr(),
            len: bytes.len(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Borrow the described bytes
    ///
    /// # Safety
    /// The bytes passed to `describe` must still be alive, i.e. the cleanup
    /// token of the call that produced this buffer has not run yet.
    pub unsafe fn as_bytes(&self) -> &[u8] {
        if self.len == 0 {
            return &[];
        }
        core::slice::from_raw_parts(self.data, self.len)
    }
}

/// Wire form of text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextWire {
    /// Outbound: a freshly created foreign string, owned by the callee
    Handle(RawRef),
    /// Inbound: runtime-owned buffer released by cleanup
    Buffer(*const WireBuffer),
}

impl WireValue for TextWire {
    const SLOTS: usize = 1;

    #[inline]
    fn write(self, pack: &mut WirePack) {
        match self {
            Self::Handle(raw) => raw.write(pack),
            Self::Buffer(ptr) => pack.push(WireSlot::from_ptr(ptr as *const c_void)),
        }
    }
}

impl SingleSlot for TextWire {
    #[inline]
    fn read(slot: WireSlot) -> Self {
        Self::Buffer(slot.as_ptr() as *const WireBuffer)
    }
}

/// Element type of a memory view, as understood by the runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ViewElementKind {
    I8 = 0,
    U8 = 1,
    I16 = 2,
    U16 = 3,
    I32 = 4,
    U32 = 5,
    F32 = 6,
    F64 = 7,
}

impl ViewElementKind {
    /// Decode the descriptor word written by `MemoryViewWire`
    pub const fn from_code(code: u32) -> Option<Self> {
        Some(match code {
            0 => Self::I8,
            1 => Self::U8,
            2 => Self::I16,
            3 => Self::U16,
            4 => Self::I32,
            5 => Self::U32,
            6 => Self::F32,
            7 => Self::F64,
            _ => return None,
        })
    }

    /// Element size in bytes
    pub const fn size(self) -> usize {
        match self {
            Self::I8 | Self::U8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::I32 | Self::U32 | Self::F32 => 4,
            Self::F64 => 8,
        }
    }
}

/// Two-slot wire form of a typed memory view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryViewWire {
    pub kind: ViewElementKind,
    pub len: u32,
    pub data: *const c_void,
}

impl MemoryViewWire {
    /// Reassemble from the descriptor and pointer slots
    pub fn from_slots(descriptor: WireSlot, data: WireSlot) -> Option<Self> {
        let [code, len] = descriptor.words();
        Some(Self {
            kind: ViewElementKind::from_code(code)?,
            len,
            data: data.as_ptr(),
        })
    }
}

impl WireValue for MemoryViewWire {
    const SLOTS: usize = 2;

    #[inline]
    fn write(self, pack: &mut WirePack) {
        pack.push(WireSlot::from_words(self.kind as u32, self.len));
        pack.push(WireSlot::from_ptr(self.data));
    }
}
