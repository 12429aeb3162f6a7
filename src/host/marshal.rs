//! Host-side marshalling - wire slots <-> runtime values
//!
//! Decoding follows the descriptor list slot by slot. Handle and text
//! arguments are consumed (decremented) as they are decoded, and decoding
//! always runs to the end of the list so that a failing argument never
//! leaks the handles after it.
//!
//! Encoding coerces a value to the requested native kind. A value that does
//! not fit (wrong type, fractional, out of range) is a coercion error, never
//! truncated bits.

use super::value::Value;
use super::Inner;
use crate::binding::{TypeDescriptor, TypeInfo, WireKind};
use crate::boundary::RawRef;
use crate::error::{BoundaryError, Result};
use crate::wire::{MemoryViewWire, SingleSlot, ViewElementKind, WireBuffer, WireSlot};
use core::ffi::c_void;

/// UTF-8 bytes handed to native code, released when the call's cleanup runs
pub(super) struct OwnedBuffer {
    _bytes: Box<[u8]>,
    wire: Box<WireBuffer>,
}

impl OwnedBuffer {
    fn new(text: &str) -> Self {
        let bytes: Box<[u8]> = text.as_bytes().into();
        let wire = Box::new(WireBuffer::describe(&bytes));
        Self { _bytes: bytes, wire }
    }

    fn as_ptr(&self) -> *const WireBuffer {
        &*self.wire
    }
}

fn unsupported(name: &str) -> BoundaryError {
    BoundaryError::Unsupported {
        descriptor: name.to_string(),
    }
}

pub(super) fn info_of(descriptor: TypeDescriptor) -> Result<TypeInfo> {
    descriptor
        .info()
        .ok_or_else(|| unsupported(&format!("#{}", descriptor.raw())))
}

impl Inner {
    /// Decode a full argument pack
    pub(super) fn decode_args(&self, arg_types: &[TypeDescriptor], slots: &[WireSlot]) -> Result<Vec<Value>> {
        let mut values = Vec::with_capacity(arg_types.len());
        let mut first_error = None;
        let mut rest = slots;

        for &descriptor in arg_types {
            let decoded = info_of(descriptor).and_then(|info| {
                let width = info.kind.slots();
                if rest.len() < width {
                    return Err(unsupported(&format!("{} (pack too short)", info.name)));
                }
                let (own, tail) = rest.split_at(width);
                rest = tail;
                self.decode_value(info, own)
            });

            match decoded {
                Ok(value) => values.push(value),
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }
        if !rest.is_empty() {
            return Err(unsupported(&format!("{} trailing slots", rest.len())));
        }
        Ok(values)
    }

    /// Decode one native value occupying `slots`
    pub(super) fn decode_value(&self, info: TypeInfo, slots: &[WireSlot]) -> Result<Value> {
        let slot = slots.first().copied().unwrap_or(WireSlot::ZERO);

        match info.kind {
            WireKind::Bool => Ok(Value::Bool(slot.as_u32() != 0)),
            WireKind::Integer { signed, bytes } if bytes <= 4 => Ok(Value::Number(if signed {
                f64::from(slot.as_u32() as i32)
            } else {
                f64::from(slot.as_u32())
            })),
            WireKind::Integer { signed, .. } => Ok(Value::BigInt(if signed {
                i128::from(slot.as_u64() as i64)
            } else {
                i128::from(slot.as_u64())
            })),
            WireKind::Float { bytes: 4 } => Ok(Value::Number(f64::from(slot.as_f32()))),
            WireKind::Float { .. } => Ok(Value::Number(slot.as_f64())),
            WireKind::Pointer => Ok(Value::Number(slot.as_ptr() as usize as f64)),
            WireKind::Value | WireKind::Text => {
                let raw = RawRef::read(slot);
                let value = self.handles.borrow().value(raw);
                // The slot carried the callee's own reference
                let released = self.handles.borrow_mut().decref(raw);
                drop(released);
                value
            }
            WireKind::MemoryView => {
                let (descriptor, data) = match slots {
                    [descriptor, data, ..] => (*descriptor, *data),
                    _ => return Err(unsupported(info.name)),
                };
                let view = MemoryViewWire::from_slots(descriptor, data)
                    .ok_or_else(|| unsupported(info.name))?;
                // SAFETY: the caller keeps the viewed memory borrowed for the
                // duration of the boundary call
                let items = unsafe { read_view(view) };
                Ok(self.realm.array(items))
            }
            WireKind::Void | WireKind::Interface => Err(unsupported(info.name)),
        }
    }

    /// Coerce `value` to the native kind of `info` and encode it
    ///
    /// Text results are copied into buffers appended to `buffers`, which the
    /// caller ties to the call's cleanup token.
    pub(super) fn encode_result(
        &self,
        value: &Value,
        info: TypeInfo,
        buffers: &mut Vec<OwnedBuffer>,
    ) -> Result<WireSlot> {
        let mismatch = || BoundaryError::coercion(info.name, value.describe());

        match info.kind {
            WireKind::Void => Ok(WireSlot::ZERO),
            WireKind::Bool => match value {
                Value::Bool(b) => Ok(WireSlot::from_u32(u32::from(*b))),
                _ => Err(mismatch()),
            },
            WireKind::Integer { signed, bytes } => {
                integer_slot(value, signed, bytes).ok_or_else(mismatch)
            }
            WireKind::Float { bytes } => {
                let n = match value {
                    Value::Number(n) => *n,
                    Value::BigInt(i) => *i as f64,
                    _ => return Err(mismatch()),
                };
                Ok(if bytes == 4 {
                    WireSlot::from_f32(n as f32)
                } else {
                    WireSlot::from_f64(n)
                })
            }
            WireKind::Pointer => fit::<usize>(value)
                .map(|address| WireSlot::from_ptr(address as *const c_void))
                .ok_or_else(mismatch),
            WireKind::Value => {
                let raw = self.handles.borrow_mut().allocate(value.clone());
                Ok(WireSlot::from_u32(raw.bits()))
            }
            WireKind::Text => match value {
                Value::String(s) => {
                    let buffer = OwnedBuffer::new(s);
                    let slot = WireSlot::from_ptr(buffer.as_ptr() as *const c_void);
                    buffers.push(buffer);
                    Ok(slot)
                }
                _ => Err(mismatch()),
            },
            WireKind::MemoryView | WireKind::Interface => Err(unsupported(info.name)),
        }
    }
}

/// Exact integral conversion: numbers must be finite and whole, and both
/// numbers and big integers must be in range for `T`
fn fit<T: num_traits::NumCast>(value: &Value) -> Option<T> {
    use num_traits::NumCast;

    match value {
        Value::Number(n) if n.is_finite() && n.fract() == 0.0 => <T as NumCast>::from(*n),
        Value::BigInt(i) => <T as NumCast>::from(*i),
        _ => None,
    }
}

fn integer_slot(value: &Value, signed: bool, bytes: u8) -> Option<WireSlot> {
    fn word<T: num_traits::NumCast>(value: &Value) -> Option<WireSlot> {
        fit::<T>(value)
            .and_then(|v| num_traits::ToPrimitive::to_i64(&v))
            .map(|v| WireSlot::from_u32(v as u32))
    }

    match (signed, bytes) {
        (true, 1) => word::<i8>(value),
        (false, 1) => word::<u8>(value),
        (true, 2) => word::<i16>(value),
        (false, 2) => word::<u16>(value),
        (true, 4) => word::<i32>(value),
        (false, 4) => word::<u32>(value),
        (true, _) => fit::<i64>(value).map(|v| WireSlot::from_u64(v as u64)),
        (false, _) => fit::<u64>(value).map(WireSlot::from_u64),
    }
}

/// Copy a native typed slice into numbers
///
/// # Safety
/// `view.data` must point to `view.len` readable elements of `view.kind`.
unsafe fn read_view(view: MemoryViewWire) -> Vec<Value> {
    unsafe fn copy<T: Copy>(data: *const c_void, len: usize, convert: fn(T) -> f64) -> Vec<Value> {
        if len == 0 || data.is_null() {
            return Vec::new();
        }
        core::slice::from_raw_parts(data as *const T, len)
            .iter()
            .map(|item| Value::Number(convert(*item)))
            .collect()
    }

    let len = view.len as usize;
    match view.kind {
        ViewElementKind::I8 => copy::<i8>(view.data, len, f64::from),
        ViewElementKind::U8 => copy::<u8>(view.data, len, f64::from),
        ViewElementKind::I16 => copy::<i16>(view.data, len, f64::from),
        ViewElementKind::U16 => copy::<u16>(view.data, len, f64::from),
        ViewElementKind::I32 => copy::<i32>(view.data, len, f64::from),
        ViewElementKind::U32 => copy::<u32>(view.data, len, f64::from),
        ViewElementKind::F32 => copy::<f32>(view.data, len, f64::from),
        ViewElementKind::F64 => copy::<f64>(view.data, len, |n| n),
    }
}
