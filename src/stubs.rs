//! Method-caller cache - one foreign stub per call signature
//!
//! Design: creating a stub allocates a foreign callable that is never
//! freed, so stubs are memoised per runtime instance (the cache lives in the
//! runtime's `RuntimeState`, not in an installation), keyed by the full
//! descriptor sequence (return type first). Argument types such as `&str`
//! and `&Val` borrow, so they have no `TypeId`; the descriptor list is the
//! stable identity of a signature instead.

use crate::binding::{signature, ArgList, FromWire, TypeDescriptor};
use crate::boundary::{Boundary, Descriptors, MethodStub};
use crate::error::{BoundaryError, Result};
use crate::logging::log_stub_created;
use std::cell::RefCell;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy)]
struct StubEntry {
    stub: MethodStub,
    /// Slot count of the argument pack the stub was created for
    slots: usize,
}

/// Per-runtime memo of method stubs
#[derive(Debug, Default)]
pub struct StubCache {
    entries: RefCell<HashMap<Descriptors, StubEntry>>,
}

impl StubCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stub for calling a method with arguments `A` that returns `R`
    ///
    /// The first request for a signature creates the stub; later requests
    /// return the memoised one. With `verify` set, the argument pack layout
    /// is checked against the registered descriptors before a stub is
    /// created or reused.
    pub fn get<R: FromWire, A: ArgList>(&self, boundary: &dyn Boundary, verify: bool) -> Result<MethodStub> {
        let key = signature::<R, A>();

        if let Some(entry) = self.entries.borrow().get(&key) {
            if verify && entry.slots != A::SLOTS {
                return Err(layout_mismatch(&key[1..], A::SLOTS));
            }
            return Ok(entry.stub);
        }

        if verify {
            check_layout(&key[1..], A::SLOTS)?;
        }

        // The borrow is released before calling out: stub creation may
        // re-enter the runtime
        let stub = boundary.create_method_stub(&key);
        log_stub_created(stub.raw(), A::LEN);

        self.entries.borrow_mut().insert(
            key,
            StubEntry {
                stub,
                slots: A::SLOTS,
            },
        );
        Ok(stub)
    }

    /// Number of cached signatures
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Check that `slots` is the pack size the registered kinds of `arg_types` imply
pub(crate) fn check_layout(arg_types: &[TypeDescriptor], slots: usize) -> Result<()> {
    let expected: Option<usize> = arg_types
        .iter()
        .map(|descriptor| descriptor.info().map(|info| info.kind.slots()))
        .sum();

    match expected {
        Some(expected) if expected == slots => Ok(()),
        _ => Err(layout_mismatch(arg_types, slots)),
    }
}

fn layout_mismatch(arg_types: &[TypeDescriptor], slots: usize) -> BoundaryError {
    let names: Vec<&str> = arg_types
        .iter()
        .map(|descriptor| descriptor.info().map_or("<unregistered>", |info| info.name))
        .collect();

    BoundaryError::Unsupported {
        descriptor: format!("({}) packed into {} slots", names.join(", "), slots),
    }
}
