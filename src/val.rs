//! Opaque references - refcounted handles to foreign values
//!
//! Design: `Val` is a bare runtime-assigned identity. Ownership follows the
//! foreign refcount exactly:
//! - construct: adopts the increment returned by the primitive
//! - clone: increment
//! - move: nothing (the source is statically dead)
//! - `take`: steals the identity, leaving an empty handle
//! - drop or overwrite: decrement, unless empty
//!
//! A handle also records the runtime it was created in. Operations and the
//! final decrement go to that runtime even when another one has been
//! installed on top of it since. `Val` is neither `Send` nor `Sync`.

use crate::binding::{interface_descriptor, ArgList, BindingType, FromWire, IntoWire, TypeDescriptor, TypeRegistry, WireKind};
use crate::boundary::{Boundary, RawRef};
use crate::cleanup::CleanupGuard;
use crate::context::{self, Context, RuntimeId};
use crate::error::{BoundaryError, Result};
use crate::logging::{self, log_leaked_handle, log_refcount};
use crate::stubs;
use crate::wire::{SingleSlot, WirePack, WireSlot, WireValue};
use std::fmt;
use std::marker::PhantomData;
use std::mem;

/// Owned reference to a value living in the foreign runtime
pub struct Val {
    raw: RawRef,
    owner: RuntimeId,
    _thread: PhantomData<*const ()>,
}

impl Val {
    /// Adopt a reference that has already been incremented for this handle
    ///
    /// The handle belongs to the runtime current on this thread.
    #[inline]
    pub fn take_ownership(raw: RawRef) -> Self {
        Self::owned_by(raw, context::current_runtime())
    }

    #[inline]
    fn owned_by(raw: RawRef, owner: RuntimeId) -> Self {
        Self {
            raw,
            owner,
            _thread: PhantomData,
        }
    }

    /// The runtime this handle was created in
    #[inline]
    pub fn owner(&self) -> RuntimeId {
        self.owner
    }

    /// The identity, still owned by this handle
    #[inline]
    pub fn as_raw(&self) -> RawRef {
        self.raw
    }

    /// Give up ownership without decrementing
    #[inline]
    pub fn into_raw(self) -> RawRef {
        let raw = self.raw;
        mem::forget(self);
        raw
    }

    /// Steal the identity, leaving this handle empty
    #[inline]
    pub fn take(&mut self) -> Val {
        Self::owned_by(mem::replace(&mut self.raw, RawRef::EMPTY), self.owner)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// New empty foreign array
    ///
    /// # Panics
    /// If no runtime is installed on this thread.
    pub fn array() -> Self {
        Self::fresh("new_array", |boundary| boundary.new_array())
    }

    /// New empty foreign object
    ///
    /// # Panics
    /// If no runtime is installed on this thread.
    pub fn object() -> Self {
        Self::fresh("new_object", |boundary| boundary.new_object())
    }

    /// # Panics
    /// If no runtime is installed on this thread.
    pub fn undefined() -> Self {
        Self::fresh("undefined", |boundary| boundary.undefined())
    }

    /// # Panics
    /// If no runtime is installed on this thread.
    pub fn null() -> Self {
        Self::fresh("null", |boundary| boundary.null())
    }

    fn fresh(operation: &'static str, make: impl FnOnce(&dyn Boundary) -> RawRef) -> Self {
        let ctx = context::expect_current();
        ctx.record_call(operation, 0);
        Self::owned_by(make(ctx.boundary()), ctx.runtime())
    }

    /// Global variable `name`
    pub fn global(name: &str) -> Result<Self> {
        let ctx = context::current()?;
        ctx.record_call("get_global", 0);
        ctx.boundary()
            .get_global(name)
            .map(|raw| Self::owned_by(raw, ctx.runtime()))
            .map_err(|e| ctx.record_error("get_global", e))
    }

    /// Property `name` of the embedding module
    pub fn module_property(name: &str) -> Result<Self> {
        let ctx = context::current()?;
        ctx.record_call("get_module_property", 0);
        ctx.boundary()
            .get_module_property(name)
            .map(|raw| Self::owned_by(raw, ctx.runtime()))
            .map_err(|e| ctx.record_error("get_module_property", e))
    }

    /// Wrap a native value in a new foreign value
    pub fn from_value<T: IntoWire>(value: T) -> Result<Self> {
        let ctx = context::current()?;
        let mut pack = WirePack::with_capacity(<T::Wire as WireValue>::SLOTS);
        value.into_wire(ctx.boundary()).write(&mut pack);

        ctx.record_call("take_value", pack.len());
        ctx.boundary()
            .take_value(T::descriptor(), pack.as_slice())
            .map(|raw| Self::owned_by(raw, ctx.runtime()))
            .map_err(|e| ctx.record_error("take_value", e))
    }

    fn live(&self) -> Result<RawRef> {
        if self.raw.is_empty() {
            Err(BoundaryError::EmptyHandle)
        } else {
            Ok(self.raw)
        }
    }

    /// Read property `key`
    pub fn get<K: IntoWire>(&self, key: K) -> Result<Val> {
        let target = self.live()?;
        let ctx = context::enter(self.owner)?;
        let key = Val::from_value(key)?;

        ctx.record_call("get_property", 0);
        ctx.boundary()
            .get_property(target, key.raw)
            .map(|raw| Self::owned_by(raw, ctx.runtime()))
            .map_err(|e| ctx.record_error("get_property", e))
    }

    /// Write property `key`
    pub fn set<K: IntoWire, V: IntoWire>(&self, key: K, value: V) -> Result<()> {
        let target = self.live()?;
        let ctx = context::enter(self.owner)?;
        let key = Val::from_value(key)?;
        let value = Val::from_value(value)?;

        ctx.record_call("set_property", 0);
        ctx.boundary()
            .set_property(target, key.raw, value.raw)
            .map_err(|e| ctx.record_error("set_property", e))
    }

    /// Call this value as a function with `undefined` as receiver
    pub fn invoke<A: ArgList>(&self, args: A) -> Result<Val> {
        let target = self.live()?;
        let ctx = context::enter(self.owner)?;
        let arg_types = prepare::<A>(&ctx)?;
        let pack = args.encode(ctx.boundary());

        ctx.record_call("call", pack.len());
        ctx.boundary()
            .call(target, &arg_types, pack.as_slice())
            .map(|raw| Self::owned_by(raw, ctx.runtime()))
            .map_err(|e| ctx.record_error("call", e))
    }

    /// Call this value as a constructor
    pub fn construct<A: ArgList>(&self, args: A) -> Result<Val> {
        let target = self.live()?;
        let ctx = context::enter(self.owner)?;
        let arg_types = prepare::<A>(&ctx)?;
        let pack = args.encode(ctx.boundary());

        ctx.record_call("construct", pack.len());
        ctx.boundary()
            .construct(target, &arg_types, pack.as_slice())
            .map(|raw| Self::owned_by(raw, ctx.runtime()))
            .map_err(|e| ctx.record_error("construct", e))
    }

    /// Call method `name` and convert its result to `R`
    ///
    /// The method caller for the `(R, A)` signature is created on first use
    /// and reused afterwards.
    pub fn call<R: FromWire, A: ArgList>(&self, name: &str, args: A) -> Result<R> {
        let target = self.live()?;
        let ctx = context::enter(self.owner)?;
        let stub = ctx.stubs().get::<R, A>(ctx.boundary(), ctx.verify_signatures())?;
        let pack = args.encode(ctx.boundary());

        ctx.record_call("invoke_stub", pack.len());
        let (result, token) = ctx.boundary().invoke_stub(stub, target, name, pack.as_slice());
        let _cleanup = CleanupGuard::new(&ctx, token);

        let slot = result.map_err(|e| ctx.record_error("invoke_stub", e))?;
        // SAFETY: the slot was produced for `R::descriptor()` by this call,
        // and its cleanup guard is still alive
        Ok(unsafe { R::from_wire(slot) })
    }

    /// Coerce to native `T`
    pub fn to<T: FromWire>(&self) -> Result<T> {
        let target = self.live()?;
        let ctx = context::enter(self.owner)?;

        ctx.record_call("value_as", 0);
        let (result, token) = ctx.boundary().value_as(target, T::descriptor());
        let _cleanup = CleanupGuard::new(&ctx, token);

        let slot = result.map_err(|e| ctx.record_error("value_as", e))?;
        // SAFETY: as in `call`
        Ok(unsafe { T::from_wire(slot) })
    }

    /// Runtime type tag, as a foreign string
    pub fn type_of(&self) -> Result<Val> {
        let target = self.live()?;
        let ctx = context::enter(self.owner)?;
        ctx.record_call("type_of", 0);
        Ok(Self::owned_by(ctx.boundary().type_of(target), ctx.runtime()))
    }

    /// True if this value provides its own callable `name`, rather than the
    /// default registered for interface `I`
    pub fn has_function<I: ?Sized + 'static>(&self, name: &str) -> bool {
        let Ok(target) = self.live() else {
            return false;
        };
        let Ok(ctx) = context::enter(self.owner) else {
            return false;
        };

        ctx.record_call("has_function", 0);
        ctx.boundary()
            .has_function(target, name, interface_descriptor::<I>())
    }

    /// `Object.prototype.hasOwnProperty.call(self, key)`
    pub fn has_own_property<K: IntoWire>(&self, key: K) -> Result<bool> {
        self.live()?;
        let _ctx = context::enter(self.owner)?;
        Val::global("Object")?
            .get("prototype")?
            .get("hasOwnProperty")?
            .call::<bool, _>("call", (self, key))
    }

    /// Append elements `0..length` of this array-like value to `out`
    ///
    /// Elements are converted in order. On failure, elements converted
    /// before the failing index stay in `out`.
    pub fn read_array_into<T: FromWire>(&self, out: &mut Vec<T>) -> Result<()> {
        let _ctx = context::enter(self.owner)?;
        let length = self.get("length")?.to::<u32>()?;
        out.reserve(length as usize);

        for index in 0..length {
            out.push(self.get(index)?.to::<T>()?);
        }
        Ok(())
    }
}

/// Descriptors for `A`, layout-checked when the context asks for it
fn prepare<A: ArgList>(ctx: &Context) -> Result<crate::boundary::Descriptors> {
    let arg_types = A::descriptors();
    if ctx.verify_signatures() {
        stubs::check_layout(&arg_types, A::SLOTS)?;
    }
    Ok(arg_types)
}

/// Convert every element of an array-like value
pub fn vec_from_array<T: FromWire>(array: &Val) -> Result<Vec<T>> {
    let mut out = Vec::new();
    array.read_array_into(&mut out)?;
    Ok(out)
}

/// Intern a property-name symbol in the current runtime
pub fn register_symbol(name: &str) -> Result<()> {
    let ctx = context::current()?;
    ctx.record_call("register_symbol", 0);
    ctx.boundary().register_symbol(name);
    Ok(())
}

/// Increment `raw` in its owning runtime
///
/// # Panics
/// If the owning runtime is not installed on this thread.
fn retain(raw: RawRef, owner: RuntimeId) {
    if raw.is_empty() {
        return;
    }
    match context::find(owner) {
        Some(ctx) => {
            log_refcount("incref", raw.bits());
            ctx.boundary().incref(raw);
        }
        None => {
            logging::error!(event = "no_runtime", handle = raw.bits(), "Cloning a handle whose runtime is not installed");
            panic!("no foreign runtime installed on this thread for handle {}", raw.bits());
        }
    }
}

/// Decrement `raw` in its owning runtime, or leak it if that runtime is gone
fn release(raw: RawRef, owner: RuntimeId) {
    if raw.is_empty() {
        return;
    }
    match context::find(owner) {
        Some(ctx) => {
            log_refcount("decref", raw.bits());
            ctx.boundary().decref(raw);
        }
        None => log_leaked_handle(raw.bits()),
    }
}

impl Clone for Val {
    fn clone(&self) -> Self {
        retain(self.raw, self.owner);
        Self::owned_by(self.raw, self.owner)
    }

    /// Increment the source before releasing the old value, so assigning a
    /// handle to the same foreign value never drops it to zero
    fn clone_from(&mut self, source: &Self) {
        retain(source.raw, source.owner);
        let old = mem::replace(&mut self.raw, source.raw);
        let old_owner = mem::replace(&mut self.owner, source.owner);
        release(old, old_owner);
    }
}

impl Drop for Val {
    fn drop(&mut self) {
        release(mem::replace(&mut self.raw, RawRef::EMPTY), self.owner);
    }
}

impl fmt::Debug for Val {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.raw.is_empty() {
            write!(f, "Val(<empty>)")
        } else {
            write!(f, "Val({})", self.raw.bits())
        }
    }
}

/// Copy `text` into a new foreign string
///
/// # Panics
/// If no runtime is installed on this thread.
impl From<&str> for Val {
    fn from(text: &str) -> Self {
        Self::fresh("new_string", |boundary| boundary.new_string(text))
    }
}

impl BindingType for Val {
    type Wire = RawRef;

    fn descriptor() -> TypeDescriptor {
        TypeRegistry::global().descriptor_for::<Val>(WireKind::Value)
    }
}

impl IntoWire for Val {
    /// The handle's own increment travels with the slot
    #[inline]
    fn into_wire(self, _boundary: &dyn Boundary) -> RawRef {
        self.into_raw()
    }
}

impl FromWire for Val {
    /// Adopts the increment carried by the slot, in the current runtime
    #[inline]
    unsafe fn from_wire(slot: WireSlot) -> Self {
        Self::take_ownership(RawRef::read(slot))
    }
}

impl BindingType for &Val {
    type Wire = RawRef;

    #[inline]
    fn descriptor() -> TypeDescriptor {
        Val::descriptor()
    }
}

impl IntoWire for &Val {
    #[inline]
    fn into_wire(self, boundary: &dyn Boundary) -> RawRef {
        if !self.raw.is_empty() {
            log_refcount("incref", self.raw.bits());
            boundary.incref(self.raw);
        }
        self.raw
    }
}
