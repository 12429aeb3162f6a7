//! Type bindings - native types <-> wire representations
//!
//! Design: an open set of trait impls rather than a closed enum. Each
//! native type names its wire representation and its descriptor; the
//! conversion directions are separate traits because some types only
//! travel one way (`&str`, memory views, `()`).
//!
//! Architecture:
//! - `registry.rs` - process-wide `TypeDescriptor` registry
//! - `primitives.rs` - bindings for scalars, pointers, text, memory views
//! - `args.rs` - `ArgList`, tuples as heterogeneous argument lists

mod registry;
mod primitives;
mod args;

pub use registry::{interface_descriptor, TypeDescriptor, TypeInfo, TypeRegistry, WireKind};
pub use primitives::{MemoryView, ViewElement};
pub use args::{signature, ArgList};

pub(crate) use registry::init;

use crate::boundary::Boundary;
use crate::wire::{WireSlot, WireValue};

/// A native type with a registered wire representation
pub trait BindingType {
    /// Representation written into wire slots
    type Wire: WireValue;

    /// Process-wide descriptor for this type
    fn descriptor() -> TypeDescriptor;
}

/// Native -> wire conversion, used for arguments
pub trait IntoWire: BindingType {
    /// Convert for one boundary call
    ///
    /// Reference-like values hand the callee a reference of its own (an
    /// increment, or a freshly created foreign value).
    fn into_wire(self, boundary: &dyn Boundary) -> Self::Wire;
}

/// Wire -> native conversion, used for results
pub trait FromWire: BindingType {
    /// Convert a single result slot produced for `Self::descriptor()`
    ///
    /// # Safety
    /// `slot` must come from the installed runtime's `value_as` or
    /// `invoke_stub` for `Self::descriptor()`, and the cleanup token of that
    /// call must not have run yet: pointer-carrying slots (text buffers) are
    /// dereferenced. Handle slots carry an increment that the result adopts.
    unsafe fn from_wire(slot: WireSlot) -> Self;
}
