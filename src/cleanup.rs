//! Scoped cleanup - runs a call's cleanup token exactly once
//!
//! Boundary calls that marshal temporaries hand back a `CleanupToken`. The
//! token is wrapped in a `CleanupGuard` before the call's result is looked
//! at, so the runtime's pending releases happen on every exit path,
//! including `?` propagation and unwinding.

use crate::boundary::CleanupToken;
use crate::context::Context;
use crate::logging::log_cleanup;

/// RAII owner of one cleanup token
#[must_use = "dropping the guard immediately runs the cleanup"]
pub struct CleanupGuard<'a> {
    context: &'a Context,
    token: Option<CleanupToken>,
}

impl<'a> CleanupGuard<'a> {
    #[inline]
    pub(crate) fn new(context: &'a Context, token: CleanupToken) -> Self {
        Self {
            context,
            token: Some(token),
        }
    }

    /// Run the cleanup now instead of at scope exit
    pub fn finish(mut self) {
        self.run();
    }

    fn run(&mut self) {
        if let Some(token) = self.token.take() {
            log_cleanup(token.raw());
            self.context.boundary().run_cleanup(token);
            self.context.record_cleanup();
        }
    }
}

impl Drop for CleanupGuard<'_> {
    fn drop(&mut self) {
        self.run();
    }
}
