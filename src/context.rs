//! Runtime context - the foreign runtimes installed on the current thread
//!
//! Design: installed runtimes form a per-thread stack. The top of the stack
//! is the current runtime, which new handles are created in. Each handle
//! records the id of the runtime it was created in; operations on it select
//! that runtime from the stack, so a handle made under an outer `install`
//! keeps working (and is released correctly) while an inner one is active.
//!
//! Per-runtime state that must outlive a single installation (the stub
//! cache) lives in `RuntimeState`, owned by the `Boundary` implementation.
//! Installing the same runtime twice, nested or in sequence, shares it.

use crate::boundary::Boundary;
use crate::config::BridgeConfig;
use crate::error::{BoundaryError, Result};
use crate::logging::{self, debug, log_boundary_call, log_boundary_error};
use crate::stubs::StubCache;
use std::cell::{Cell, RefCell};
use std::marker::PhantomData;
use std::ops::Deref;
use std::rc::Rc;
use std::sync::atomic::{AtomicU32, Ordering};

thread_local! {
    static STACK: RefCell<Vec<Rc<Context>>> = const { RefCell::new(Vec::new()) };
}

static NEXT_RUNTIME_ID: AtomicU32 = AtomicU32::new(1);

/// Process-unique identity of one runtime instance
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RuntimeId(u32);

impl RuntimeId {
    /// Owner of handles adopted while no runtime was installed
    pub const UNOWNED: Self = Self(0);

    #[inline]
    pub const fn get(self) -> u32 {
        self.0
    }
}

/// Bridge state attached to one runtime instance
///
/// A `Boundary` implementation creates one of these per runtime and returns
/// it from `Boundary::state`. Clones of a runtime handle must return the
/// same state.
#[derive(Debug)]
pub struct RuntimeState {
    id: RuntimeId,
    stubs: StubCache,
}

impl RuntimeState {
    pub fn new() -> Self {
        Self {
            id: RuntimeId(NEXT_RUNTIME_ID.fetch_add(1, Ordering::Relaxed)),
            stubs: StubCache::new(),
        }
    }

    #[inline]
    pub fn id(&self) -> RuntimeId {
        self.id
    }

    /// Method stubs created for this runtime
    #[inline]
    pub fn stubs(&self) -> &StubCache {
        &self.stubs
    }
}

impl Default for RuntimeState {
    fn default() -> Self {
        Self::new()
    }
}

/// Counters kept by a runtime context
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeStats {
    /// Boundary primitives invoked through `Val` operations
    pub boundary_calls: u64,
    /// Method stubs created for the runtime (one per distinct signature)
    pub stubs_created: u64,
    /// Cleanup tokens run
    pub cleanups_run: u64,
    /// Failed `to` conversions
    pub coercion_failures: u64,
}

/// One installation of a runtime on this thread
pub struct Context {
    boundary: Rc<dyn Boundary>,
    runtime: RuntimeId,
    verify_signatures: bool,
    trace_calls: bool,
    boundary_calls: Cell<u64>,
    cleanups_run: Cell<u64>,
    coercion_failures: Cell<u64>,
}

impl Context {
    fn new(boundary: Rc<dyn Boundary>, config: &BridgeConfig) -> Self {
        let runtime = boundary.state().id();
        Self {
            boundary,
            runtime,
            verify_signatures: config.boundary.verify_signatures,
            trace_calls: config.boundary.trace_calls,
            boundary_calls: Cell::new(0),
            cleanups_run: Cell::new(0),
            coercion_failures: Cell::new(0),
        }
    }

    #[inline]
    pub(crate) fn boundary(&self) -> &dyn Boundary {
        &*self.boundary
    }

    #[inline]
    pub(crate) fn runtime(&self) -> RuntimeId {
        self.runtime
    }

    #[inline]
    pub(crate) fn stubs(&self) -> &StubCache {
        self.boundary.state().stubs()
    }

    #[inline]
    pub(crate) fn verify_signatures(&self) -> bool {
        self.verify_signatures
    }

    /// Count (and optionally trace) one boundary primitive
    #[inline]
    pub(crate) fn record_call(&self, operation: &'static str, arg_slots: usize) {
        self.boundary_calls.set(self.boundary_calls.get() + 1);
        if self.trace_calls {
            log_boundary_call(operation, arg_slots);
        }
    }

    /// Log a failed primitive and pass the error through
    pub(crate) fn record_error(&self, operation: &'static str, error: BoundaryError) -> BoundaryError {
        if matches!(error, BoundaryError::Coercion { .. }) {
            self.coercion_failures.set(self.coercion_failures.get() + 1);
        }
        log_boundary_error(operation, &error);
        error
    }

    #[inline]
    pub(crate) fn record_cleanup(&self) {
        self.cleanups_run.set(self.cleanups_run.get() + 1);
    }

    pub fn stats(&self) -> BridgeStats {
        BridgeStats {
            boundary_calls: self.boundary_calls.get(),
            stubs_created: self.stubs().len() as u64,
            cleanups_run: self.cleanups_run.get(),
            coercion_failures: self.coercion_failures.get(),
        }
    }
}

/// Remove the topmost stack entry that is `context`
fn remove_entry(context: &Rc<Context>) {
    // Thread-local may already be torn down during thread exit
    let _ = STACK.try_with(|stack| {
        let mut stack = stack.borrow_mut();
        if let Some(index) = stack.iter().rposition(|entry| Rc::ptr_eq(entry, context)) {
            stack.remove(index);
        }
    });
}

/// Uninstalls its runtime on drop, reinstating the one below it
///
/// Not `Send`: it must be dropped on the thread that installed it.
#[must_use = "the runtime is uninstalled when the guard is dropped"]
pub struct ContextGuard {
    context: Rc<Context>,
    _not_send: PhantomData<*const ()>,
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        remove_entry(&self.context);
        debug!(
            event = "runtime_uninstalled",
            runtime = self.context.runtime.get(),
            "Foreign runtime uninstalled"
        );
    }
}

/// Install `boundary` as this thread's runtime with configuration from
/// `.valref.toml` discovery
pub fn install(boundary: impl Boundary + 'static) -> ContextGuard {
    install_with_config(boundary, &BridgeConfig::discover())
}

/// Install `boundary` as this thread's runtime
pub fn install_with_config(boundary: impl Boundary + 'static, config: &BridgeConfig) -> ContextGuard {
    crate::binding::init();

    let context = Rc::new(Context::new(Rc::new(boundary), config));
    let depth = STACK.with(|stack| {
        let mut stack = stack.borrow_mut();
        stack.push(context.clone());
        stack.len()
    });

    debug!(
        event = "runtime_installed",
        runtime = context.runtime.get(),
        nested = depth > 1,
        verify_signatures = config.boundary.verify_signatures,
        "Foreign runtime installed"
    );

    ContextGuard {
        context,
        _not_send: PhantomData,
    }
}

/// True if a runtime is installed on this thread
pub fn is_installed() -> bool {
    STACK
        .try_with(|stack| !stack.borrow().is_empty())
        .unwrap_or(false)
}

/// Counters of the current runtime
pub fn stats() -> Option<BridgeStats> {
    try_current().map(|context| context.stats())
}

/// The current context, or `NoRuntime`
pub(crate) fn current() -> Result<Rc<Context>> {
    try_current().ok_or(BoundaryError::NoRuntime)
}

/// The current context; `None` when none is installed or the thread is exiting
pub(crate) fn try_current() -> Option<Rc<Context>> {
    STACK
        .try_with(|stack| stack.borrow().last().cloned())
        .ok()
        .flatten()
}

/// The current context, for operations that cannot report failure
pub(crate) fn expect_current() -> Rc<Context> {
    match try_current() {
        Some(context) => context,
        None => {
            logging::error!(event = "no_runtime", "No foreign runtime installed on this thread");
            panic!("no foreign runtime installed on this thread");
        }
    }
}

/// Id of the current runtime, `UNOWNED` when none is installed
pub(crate) fn current_runtime() -> RuntimeId {
    try_current().map_or(RuntimeId::UNOWNED, |context| context.runtime)
}

/// The topmost installation of `runtime` (of the current runtime for
/// `UNOWNED`), without changing which runtime is current
pub(crate) fn find(runtime: RuntimeId) -> Option<Rc<Context>> {
    if runtime == RuntimeId::UNOWNED {
        return try_current();
    }
    STACK
        .try_with(|stack| {
            stack
                .borrow()
                .iter()
                .rev()
                .find(|context| context.runtime == runtime)
                .cloned()
        })
        .ok()
        .flatten()
}

/// Make `runtime` current for the duration of one handle operation
///
/// Handles created while the returned scope is alive belong to `runtime`.
/// Fails with `NoRuntime` when `runtime` is not installed on this thread.
pub(crate) fn enter(runtime: RuntimeId) -> Result<Active> {
    let context = find(runtime).ok_or(BoundaryError::NoRuntime)?;

    let on_top = try_current().map_or(false, |top| Rc::ptr_eq(&top, &context));
    if !on_top {
        STACK.with(|stack| stack.borrow_mut().push(context.clone()));
        debug!(event = "runtime_entered", runtime = context.runtime.get());
    }

    Ok(Active {
        context,
        pushed: !on_top,
    })
}

/// A context selected by `enter`; pops it again if it had to be pushed
pub(crate) struct Active {
    context: Rc<Context>,
    pushed: bool,
}

impl Deref for Active {
    type Target = Context;

    #[inline]
    fn deref(&self) -> &Context {
        &self.context
    }
}

impl Drop for Active {
    fn drop(&mut self) {
        if self.pushed {
            remove_entry(&self.context);
        }
    }
}
