//! Reference runtime - an in-process dynamic object model behind `Boundary`
//!
//! Design: a small single-threaded runtime that implements every boundary
//! primitive faithfully enough to exercise the handle and marshalling layers
//! end to end. It is deliberately not a language: values are created and
//! functions are defined by the embedder through the API below.
//!
//! Architecture:
//! - `value.rs` - values, objects, prototype lookup
//! - `handles.rs` - refcounted handle table with reserved identities
//! - `marshal.rs` - wire decoding of arguments, coercion of results
//! - `builtins.rs` - `Object`, `Function`, `Array`, `Math`, `String`

mod builtins;
mod handles;
mod marshal;
mod value;

pub use builtins::native;
pub use handles::IMMORTAL;
pub use value::{same_value, NativeFn, ObjectRef, Value};

use crate::binding::{interface_descriptor, TypeDescriptor};
use crate::boundary::{Boundary, CleanupToken, Descriptors, MethodStub, RawRef};
use crate::context::RuntimeState;
use crate::error::{BoundaryError, Result};
use crate::logging::{debug, trace, warn};
use crate::wire::WireSlot;
use builtins::Realm;
use handles::HandleTable;
use marshal::{info_of, OwnedBuffer};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

/// Handle to a reference runtime; clones share the same runtime
#[derive(Clone)]
pub struct HostRuntime {
    inner: Rc<Inner>,
}

struct Inner {
    state: RuntimeState,
    handles: RefCell<HandleTable>,
    realm: Realm,
    globals: RefCell<HashMap<String, Value>>,
    module: RefCell<HashMap<String, Value>>,
    /// Signatures of created method stubs, indexed by `stub id - 1`
    stubs: RefCell<Vec<Descriptors>>,
    duplicate_stubs: Cell<usize>,
    /// Default implementations registered per interface descriptor
    interfaces: RefCell<HashMap<TypeDescriptor, ObjectRef>>,
    cleanups: RefCell<HashMap<u32, Vec<OwnedBuffer>>>,
    next_token: Cell<u32>,
    symbols: RefCell<Vec<String>>,
}

impl Default for HostRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl HostRuntime {
    /// Fresh runtime with the built-in globals installed
    pub fn new() -> Self {
        let realm = Realm::new();
        let globals = realm.install_globals();

        Self {
            inner: Rc::new(Inner {
                state: RuntimeState::new(),
                handles: RefCell::new(HandleTable::new()),
                realm,
                globals: RefCell::new(globals),
                module: RefCell::new(HashMap::new()),
                stubs: RefCell::new(Vec::new()),
                duplicate_stubs: Cell::new(0),
                interfaces: RefCell::new(HashMap::new()),
                cleanups: RefCell::new(HashMap::new()),
                next_token: Cell::new(1),
                symbols: RefCell::new(Vec::new()),
            }),
        }
    }

    // ------------------------------------------------------------------
    // Embedder API
    // ------------------------------------------------------------------

    pub fn define_global(&self, name: &str, value: Value) {
        self.inner.globals.borrow_mut().insert(name.to_string(), value);
    }

    pub fn define_module_property(&self, name: &str, value: Value) {
        self.inner.module.borrow_mut().insert(name.to_string(), value);
    }

    /// Plain function value
    pub fn function(
        &self,
        name: &str,
        call: impl Fn(&Value, &[Value]) -> std::result::Result<Value, String> + 'static,
    ) -> Value {
        self.inner.realm.function(name, false, Rc::new(call))
    }

    /// Constructor function value
    ///
    /// Under `construct`, `call` receives the new object as `this`; if it
    /// returns an object, that object is the result instead.
    pub fn constructor(
        &self,
        name: &str,
        call: impl Fn(&Value, &[Value]) -> std::result::Result<Value, String> + 'static,
    ) -> Value {
        self.inner.realm.function(name, true, Rc::new(call))
    }

    pub fn object(&self) -> Value {
        self.inner.realm.object()
    }

    /// Plain object whose prototype is `prototype` (`null` prototype if it
    /// is not an object)
    pub fn object_with_prototype(&self, prototype: &Value) -> Value {
        Value::Object(ObjectRef::new(
            value::ObjectKind::Plain,
            prototype.as_object().cloned(),
        ))
    }

    pub fn array(&self, items: Vec<Value>) -> Value {
        self.inner.realm.array(items)
    }

    /// Register the default implementations of interface `I`
    ///
    /// `has_function` filtered by `I` reports false for a method whose
    /// implementation is the one found on `defaults`.
    pub fn register_interface<I: ?Sized + 'static>(&self, defaults: &Value) {
        if let Some(object) = defaults.as_object() {
            self.inner
                .interfaces
                .borrow_mut()
                .insert(interface_descriptor::<I>(), object.clone());
        }
    }

    /// Hand `value` across the boundary with a fresh reference
    pub fn adopt(&self, value: Value) -> RawRef {
        self.inner.handles.borrow_mut().allocate(value)
    }

    pub fn value_of(&self, raw: RawRef) -> Option<Value> {
        self.inner.handles.borrow().value(raw).ok()
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    /// Reference count of `raw`; 0 once released, `IMMORTAL` for reserved ids
    pub fn refcount(&self, raw: RawRef) -> u32 {
        self.inner.handles.borrow().refcount(raw)
    }

    /// Live handles, excluding the reserved ones
    pub fn live_handles(&self) -> usize {
        self.inner.handles.borrow().live()
    }

    /// Cleanup tokens issued but not yet run
    pub fn pending_cleanups(&self) -> usize {
        self.inner.cleanups.borrow().len()
    }

    pub fn stub_creations(&self) -> usize {
        self.inner.stubs.borrow().len()
    }

    /// Stubs created for a signature that already had one
    pub fn duplicate_stubs(&self) -> usize {
        self.inner.duplicate_stubs.get()
    }

    /// True if both identities refer to the same runtime value
    pub fn same_value(&self, a: RawRef, b: RawRef) -> bool {
        let handles = self.inner.handles.borrow();
        match (handles.value(a), handles.value(b)) {
            (Ok(a), Ok(b)) => same_value(&a, &b),
            _ => false,
        }
    }

    /// Symbols registered so far, in registration order
    pub fn symbols(&self) -> Vec<String> {
        self.inner.symbols.borrow().clone()
    }

    fn value(&self, raw: RawRef) -> Result<Value> {
        self.inner.handles.borrow().value(raw)
    }

    fn allocate(&self, value: Value) -> RawRef {
        self.inner.handles.borrow_mut().allocate(value)
    }

    fn issue_token(&self, buffers: Vec<OwnedBuffer>) -> CleanupToken {
        let id = self.inner.next_token.get();
        self.inner.next_token.set(id.wrapping_add(1).max(1));
        self.inner.cleanups.borrow_mut().insert(id, buffers);
        CleanupToken::from_raw(id)
    }
}

/// Invoke `function` with `this`, converting a raised error
fn call_function(function: &Value, this: &Value, args: &[Value]) -> Result<Value> {
    let native = function
        .as_object()
        .and_then(ObjectRef::function)
        .ok_or_else(|| BoundaryError::NotCallable {
            type_tag: function.type_tag().to_string(),
        })?;

    // No runtime borrow is held here, so the function may re-enter
    (native.call)(this, args).map_err(BoundaryError::thrown)
}

impl Boundary for HostRuntime {
    fn state(&self) -> &RuntimeState {
        &self.inner.state
    }

    fn incref(&self, value: RawRef) {
        self.inner.handles.borrow_mut().incref(value);
    }

    fn decref(&self, value: RawRef) {
        let released = self.inner.handles.borrow_mut().decref(value);
        drop(released);
    }

    fn new_array(&self) -> RawRef {
        self.allocate(self.inner.realm.array(Vec::new()))
    }

    fn new_object(&self) -> RawRef {
        self.allocate(self.inner.realm.object())
    }

    fn undefined(&self) -> RawRef {
        handles::UNDEFINED
    }

    fn null(&self) -> RawRef {
        handles::NULL
    }

    fn new_string(&self, text: &str) -> RawRef {
        self.allocate(Value::from(text))
    }

    fn take_value(&self, ty: TypeDescriptor, slots: &[WireSlot]) -> Result<RawRef> {
        let info = info_of(ty)?;
        let value = self.inner.decode_value(info, slots)?;
        Ok(self.allocate(value))
    }

    fn get_global(&self, name: &str) -> Result<RawRef> {
        let value = self.inner.globals.borrow().get(name).cloned();
        Ok(self.allocate(value.unwrap_or(Value::Undefined)))
    }

    fn get_module_property(&self, name: &str) -> Result<RawRef> {
        let value = self.inner.module.borrow().get(name).cloned();
        Ok(self.allocate(value.unwrap_or(Value::Undefined)))
    }

    fn get_property(&self, object: RawRef, key: RawRef) -> Result<RawRef> {
        let object = self.value(object)?;
        let key = self.value(key)?.to_property_key();
        let value = object.get_property(&key)?;
        Ok(self.allocate(value))
    }

    fn set_property(&self, object: RawRef, key: RawRef, value: RawRef) -> Result<()> {
        let object = self.value(object)?;
        let key = self.value(key)?.to_property_key();
        let value = self.value(value)?;
        object.set_property(&key, value)
    }

    fn value_as(&self, value: RawRef, ty: TypeDescriptor) -> (Result<WireSlot>, CleanupToken) {
        let mut buffers = Vec::new();
        let result = self.value(value).and_then(|value| {
            let info = info_of(ty)?;
            self.inner.encode_result(&value, info, &mut buffers)
        });
        (result, self.issue_token(buffers))
    }

    fn call(&self, callee: RawRef, arg_types: &[TypeDescriptor], args: &[WireSlot]) -> Result<RawRef> {
        let args = self.inner.decode_args(arg_types, args);
        let callee = self.value(callee)?;
        let result = call_function(&callee, &Value::Undefined, &args?)?;
        Ok(self.allocate(result))
    }

    fn construct(
        &self,
        callee: RawRef,
        arg_types: &[TypeDescriptor],
        args: &[WireSlot],
    ) -> Result<RawRef> {
        let args = self.inner.decode_args(arg_types, args);
        let callee = self.value(callee)?;

        let constructible = callee
            .as_object()
            .and_then(ObjectRef::function)
            .map_or(false, |function| function.constructible);
        if !constructible {
            return Err(BoundaryError::NotConstructible {
                type_tag: callee.type_tag().to_string(),
            });
        }

        let prototype = match callee.get_property("prototype")? {
            Value::Object(prototype) => prototype,
            _ => self.inner.realm.object_prototype.clone(),
        };
        let this = Value::Object(ObjectRef::new(value::ObjectKind::Plain, Some(prototype)));

        let result = match call_function(&callee, &this, &args?)? {
            object @ Value::Object(_) => object,
            _ => this,
        };
        Ok(self.allocate(result))
    }

    fn create_method_stub(&self, signature: &[TypeDescriptor]) -> MethodStub {
        let mut stubs = self.inner.stubs.borrow_mut();
        if stubs.iter().any(|existing| existing.as_slice() == signature) {
            self.inner.duplicate_stubs.set(self.inner.duplicate_stubs.get() + 1);
            warn!(event = "duplicate_stub", arity = signature.len().saturating_sub(1), "Stub created twice for one signature");
        }
        stubs.push(signature.iter().copied().collect());

        let id = stubs.len() as u32;
        debug!(event = "stub_generated", stub = id, arity = signature.len().saturating_sub(1));
        MethodStub::from_raw(id)
    }

    fn invoke_stub(
        &self,
        stub: MethodStub,
        target: RawRef,
        method: &str,
        args: &[WireSlot],
    ) -> (Result<WireSlot>, CleanupToken) {
        let mut buffers = Vec::new();

        let result = (|| -> Result<WireSlot> {
            let signature = (stub.raw() as usize)
                .checked_sub(1)
                .and_then(|index| self.inner.stubs.borrow().get(index).cloned())
                .ok_or_else(|| BoundaryError::Unsupported {
                    descriptor: format!("method stub #{}", stub.raw()),
                })?;
            let (&return_type, arg_types) = signature
                .split_first()
                .ok_or_else(|| BoundaryError::Unsupported {
                    descriptor: format!("method stub #{}", stub.raw()),
                })?;

            let args = self.inner.decode_args(arg_types, args);
            let target = self.value(target)?;
            let function = target.get_property(method)?;
            if !function.is_function() {
                return Err(BoundaryError::MethodNotFound {
                    name: method.to_string(),
                });
            }

            let output = call_function(&function, &target, &args?)?;
            self.inner.encode_result(&output, info_of(return_type)?, &mut buffers)
        })();

        (result, self.issue_token(buffers))
    }

    fn has_function(&self, value: RawRef, method: &str, filter: TypeDescriptor) -> bool {
        let Ok(value) = self.value(value) else {
            return false;
        };
        let function = match value.get_property(method) {
            Ok(function) if function.is_function() => function,
            _ => return false,
        };

        match self.inner.interfaces.borrow().get(&filter) {
            Some(defaults) => match defaults.get_own(method) {
                Some(default) => !same_value(&default, &function),
                None => true,
            },
            None => true,
        }
    }

    fn type_of(&self, value: RawRef) -> RawRef {
        let tag = self
            .value(value)
            .map_or("undefined", |value| value.type_tag());
        self.allocate(Value::from(tag))
    }

    fn run_cleanup(&self, token: CleanupToken) {
        let removed = self.inner.cleanups.borrow_mut().remove(&token.raw());
        match removed {
            Some(buffers) => trace!(event = "cleanup_run", token = token.raw(), buffers = buffers.len()),
            None => warn!(event = "unknown_cleanup", token = token.raw(), "Cleanup token not issued by this runtime"),
        }
    }

    fn register_symbol(&self, name: &str) {
        let mut symbols = self.inner.symbols.borrow_mut();
        if !symbols.iter().any(|symbol| symbol == name) {
            symbols.push(name.to_string());
        }
    }
}

#[cfg(test)]
mod tests;
