//! Bindings for built-in native types
//!
//! Integers of 32 bits or less travel sign/zero-extended in one word;
//! 64-bit and pointer-sized integers carry their full bit pattern.

use super::registry::{TypeDescriptor, TypeRegistry, WireKind};
use super::{BindingType, FromWire, IntoWire};
use crate::boundary::Boundary;
use crate::wire::{MemoryViewWire, SingleSlot, TextWire, ViewElementKind, WireSlot};
use core::ffi::c_void;
use core::mem::size_of;

impl BindingType for () {
    type Wire = ();

    fn descriptor() -> TypeDescriptor {
        TypeRegistry::global().descriptor_for::<()>(WireKind::Void)
    }
}

impl FromWire for () {
    #[inline]
    unsafe fn from_wire(_slot: WireSlot) -> Self {}
}

impl BindingType for bool {
    type Wire = u32;

    fn descriptor() -> TypeDescriptor {
        TypeRegistry::global().descriptor_for::<bool>(WireKind::Bool)
    }
}

impl IntoWire for bool {
    #[inline]
    fn into_wire(self, _boundary: &dyn Boundary) -> u32 {
        u32::from(self)
    }
}

impl FromWire for bool {
    #[inline]
    unsafe fn from_wire(slot: WireSlot) -> Self {
        u32::read(slot) != 0
    }
}

macro_rules! word_integer_bindings {
    ($($ty:ty => $signed:expr),* $(,)?) => {$(
        impl BindingType for $ty {
            type Wire = u32;

            fn descriptor() -> TypeDescriptor {
                TypeRegistry::global().descriptor_for::<$ty>(WireKind::Integer {
                    signed: $signed,
                    bytes: size_of::<$ty>() as u8,
                })
            }
        }

        impl IntoWire for $ty {
            #[inline]
            fn into_wire(self, _boundary: &dyn Boundary) -> u32 {
                self as i64 as u32
            }
        }

        impl FromWire for $ty {
            #[inline]
            unsafe fn from_wire(slot: WireSlot) -> Self {
                u32::read(slot) as $ty
            }
        }
    )*};
}

word_integer_bindings! {
    i8 => true,
    u8 => false,
    i16 => true,
    u16 => false,
    i32 => true,
    u32 => false,
}

macro_rules! wide_integer_bindings {
    ($($ty:ty => $signed:expr),* $(,)?) => {$(
        impl BindingType for $ty {
            type Wire = u64;

            fn descriptor() -> TypeDescriptor {
                TypeRegistry::global().descriptor_for::<$ty>(WireKind::Integer {
                    signed: $signed,
                    bytes: 8,
                })
            }
        }

        impl IntoWire for $ty {
            #[inline]
            fn into_wire(self, _boundary: &dyn Boundary) -> u64 {
                self as u64
            }
        }

        impl FromWire for $ty {
            #[inline]
            unsafe fn from_wire(slot: WireSlot) -> Self {
                u64::read(slot) as $ty
            }
        }
    )*};
}

wide_integer_bindings! {
    i64 => true,
    u64 => false,
    isize => true,
    usize => false,
}

impl BindingType for f32 {
    type Wire = f32;

    fn descriptor() -> TypeDescriptor {
        TypeRegistry::global().descriptor_for::<f32>(WireKind::Float { bytes: 4 })
    }
}

impl IntoWire for f32 {
    #[inline]
    fn into_wire(self, _boundary: &dyn Boundary) -> f32 {
        self
    }
}

impl FromWire for f32 {
    #[inline]
    unsafe fn from_wire(slot: WireSlot) -> Self {
        f32::read(slot)
    }
}

impl BindingType for f64 {
    type Wire = f64;

    fn descriptor() -> TypeDescriptor {
        TypeRegistry::global().descriptor_for::<f64>(WireKind::Float { bytes: 8 })
    }
}

impl IntoWire for f64 {
    #[inline]
    fn into_wire(self, _boundary: &dyn Boundary) -> f64 {
        self
    }
}

impl FromWire for f64 {
    #[inline]
    unsafe fn from_wire(slot: WireSlot) -> Self {
        f64::read(slot)
    }
}

impl<T: 'static> BindingType for *const T {
    type Wire = *const c_void;

    fn descriptor() -> TypeDescriptor {
        TypeRegistry::global().descriptor_for::<*const T>(WireKind::Pointer)
    }
}

impl<T: 'static> IntoWire for *const T {
    #[inline]
    fn into_wire(self, _boundary: &dyn Boundary) -> *const c_void {
        self as *const c_void
    }
}

impl<T: 'static> FromWire for *const T {
    #[inline]
    unsafe fn from_wire(slot: WireSlot) -> Self {
        <*const c_void as SingleSlot>::read(slot) as *const T
    }
}

impl<T: 'static> BindingType for *mut T {
    type Wire = *const c_void;

    fn descriptor() -> TypeDescriptor {
        TypeRegistry::global().descriptor_for::<*mut T>(WireKind::Pointer)
    }
}

impl<T: 'static> IntoWire for *mut T {
    #[inline]
    fn into_wire(self, _boundary: &dyn Boundary) -> *const c_void {
        self as *const c_void
    }
}

impl<T: 'static> FromWire for *mut T {
    #[inline]
    unsafe fn from_wire(slot: WireSlot) -> Self {
        <*const c_void as SingleSlot>::read(slot) as *mut T
    }
}

impl BindingType for &str {
    type Wire = TextWire;

    fn descriptor() -> TypeDescriptor {
        TypeRegistry::global().descriptor_for::<str>(WireKind::Text)
    }
}

impl IntoWire for &str {
    #[inline]
    fn into_wire(self, boundary: &dyn Boundary) -> TextWire {
        TextWire::Handle(boundary.new_string(self))
    }
}

impl BindingType for String {
    type Wire = TextWire;

    fn descriptor() -> TypeDescriptor {
        TypeRegistry::global().descriptor_for::<String>(WireKind::Text)
    }
}

impl IntoWire for String {
    #[inline]
    fn into_wire(self, boundary: &dyn Boundary) -> TextWire {
        TextWire::Handle(boundary.new_string(&self))
    }
}

impl FromWire for String {
    unsafe fn from_wire(slot: WireSlot) -> Self {
        match TextWire::read(slot) {
            TextWire::Buffer(buffer) if !buffer.is_null() => {
                // SAFETY: the runtime keeps the buffer alive until the call's
                // cleanup guard drops, which happens after this conversion
                let bytes = unsafe { (*buffer).as_bytes() };
                String::from_utf8_lossy(bytes).into_owned()
            }
            _ => String::new(),
        }
    }
}

/// Element types that can back a `MemoryView`
pub trait ViewElement: Copy + 'static {
    const KIND: ViewElementKind;
}

macro_rules! view_elements {
    ($($ty:ty => $kind:ident),* $(,)?) => {$(
        impl ViewElement for $ty {
            const KIND: ViewElementKind = ViewElementKind::$kind;
        }
    )*};
}

view_elements! {
    i8 => I8,
    u8 => U8,
    i16 => I16,
    u16 => U16,
    i32 => I32,
    u32 => U32,
    f32 => F32,
    f64 => F64,
}

/// Borrowed typed slice passed to the runtime without copying
///
/// The runtime may read the memory only for the duration of the call.
#[derive(Debug, Clone, Copy)]
pub struct MemoryView<'a, T: ViewElement> {
    data: &'a [T],
    /// Element count as carried on the wire
    len: u32,
}

impl<'a, T: ViewElement> MemoryView<'a, T> {
    /// View over `data`
    ///
    /// # Panics
    /// If `data` has more than `u32::MAX` elements.
    pub fn new(data: &'a [T]) -> Self {
        match Self::try_new(data) {
            Some(view) => view,
            None => panic!("memory view of {} elements exceeds the wire length limit", data.len()),
        }
    }

    /// View over `data`, or `None` if its length does not fit the wire
    pub fn try_new(data: &'a [T]) -> Option<Self> {
        let len = wire_len(data.len())?;
        Some(Self { data, len })
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Element count of a view as a wire word
#[inline]
pub(crate) fn wire_len(len: usize) -> Option<u32> {
    u32::try_from(len).ok()
}

impl<T: ViewElement> BindingType for MemoryView<'_, T> {
    type Wire = MemoryViewWire;

    fn descriptor() -> TypeDescriptor {
        TypeRegistry::global().descriptor_for::<MemoryView<'static, T>>(WireKind::MemoryView)
    }
}

impl<T: ViewElement> IntoWire for MemoryView<'_, T> {
    #[inline]
    fn into_wire(self, _boundary: &dyn Boundary) -> MemoryViewWire {
        MemoryViewWire {
            kind: T::KIND,
            len: self.len,
            data: self.data.as_ptr() as *const c_void,
        }
    }
}
