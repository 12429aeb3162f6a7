//! Boundary primitives - the entire surface of the foreign runtime
//!
//! Design: the foreign runtime is a black box reachable only through the
//! `Boundary` trait. References, stubs and cleanup tokens are opaque ids
//! assigned by the runtime.
//!
//! Ownership conventions:
//! - every `RawRef` returned by a primitive is already incremented
//! - handle and text slots passed as call arguments are consumed by the callee
//! - keys and targets passed as `RawRef` parameters are borrowed

use crate::binding::TypeDescriptor;
use crate::context::RuntimeState;
use crate::error::Result;
use crate::wire::WireSlot;
use smallvec::SmallVec;

/// Descriptor list for one signature (return type first for method stubs)
pub type Descriptors = SmallVec<[TypeDescriptor; 8]>;

/// Runtime-assigned identity of a foreign value
///
/// Not dereferenceable natively. Zero is the empty identity, which every
/// primitive treats as "no value".
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawRef(u32);

impl RawRef {
    /// Identity of a moved-out handle
    pub const EMPTY: Self = Self(0);

    #[inline]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    #[inline]
    pub const fn bits(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// Foreign-side generated method caller for one signature
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodStub(u32);

impl MethodStub {
    /// Wrap a runtime-assigned stub id (for `Boundary` implementations)
    #[inline]
    pub const fn from_raw(id: u32) -> Self {
        Self(id)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// Pending releases for one boundary call
///
/// Deliberately neither `Clone` nor `Copy`: `run_cleanup` takes it by value,
/// so a token can be run at most once.
#[derive(Debug, PartialEq, Eq)]
pub struct CleanupToken(u32);

impl CleanupToken {
    /// Wrap a runtime-assigned token id (for `Boundary` implementations)
    #[inline]
    pub const fn from_raw(id: u32) -> Self {
        Self(id)
    }

    #[inline]
    pub const fn raw(&self) -> u32 {
        self.0
    }
}

/// Primitive operations supplied by the foreign runtime
///
/// All methods take `&self`; runtimes are single-threaded and use interior
/// mutability. Implementations must tolerate reentrant calls made while a
/// foreign function is executing.
pub trait Boundary {
    /// Bridge state of this runtime instance; the same for every clone of it
    fn state(&self) -> &RuntimeState;

    fn incref(&self, value: RawRef);

    fn decref(&self, value: RawRef);

    fn new_array(&self) -> RawRef;

    fn new_object(&self) -> RawRef;

    fn undefined(&self) -> RawRef;

    fn null(&self) -> RawRef;

    /// Copy `text` into a new foreign string
    fn new_string(&self, text: &str) -> RawRef;

    /// Build a foreign value from one wire-encoded native value of type `ty`
    fn take_value(&self, ty: TypeDescriptor, slots: &[WireSlot]) -> Result<RawRef>;

    fn get_global(&self, name: &str) -> Result<RawRef>;

    fn get_module_property(&self, name: &str) -> Result<RawRef>;

    fn get_property(&self, object: RawRef, key: RawRef) -> Result<RawRef>;

    fn set_property(&self, object: RawRef, key: RawRef, value: RawRef) -> Result<()>;

    /// Coerce `value` to native type `ty`
    ///
    /// The cleanup token is returned on failure too and must still be run.
    fn value_as(&self, value: RawRef, ty: TypeDescriptor) -> (Result<WireSlot>, CleanupToken);

    /// Call `callee` as a function with `undefined` as receiver
    fn call(&self, callee: RawRef, arg_types: &[TypeDescriptor], args: &[WireSlot]) -> Result<RawRef>;

    /// Call `callee` as a constructor
    fn construct(
        &self,
        callee: RawRef,
        arg_types: &[TypeDescriptor],
        args: &[WireSlot],
    ) -> Result<RawRef>;

    /// Generate a method caller for `signature` (return type first)
    ///
    /// Every call creates a new foreign callable that is never freed; only
    /// `StubCache` may call this.
    fn create_method_stub(&self, signature: &[TypeDescriptor]) -> MethodStub;

    /// Invoke method `method` on `target` through `stub`
    fn invoke_stub(
        &self,
        stub: MethodStub,
        target: RawRef,
        method: &str,
        args: &[WireSlot],
    ) -> (Result<WireSlot>, CleanupToken);

    /// True if `value` exposes its own callable `method`, not the default
    /// implementation registered for the interface `filter`
    fn has_function(&self, value: RawRef, method: &str, filter: TypeDescriptor) -> bool;

    /// Runtime type tag of `value`, as a new foreign string
    fn type_of(&self, value: RawRef) -> RawRef;

    fn run_cleanup(&self, token: CleanupToken);

    /// Intern a property-name symbol; runtimes without symbol tables ignore it
    fn register_symbol(&self, _name: &str) {}
}
