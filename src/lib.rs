//! valref - refcounted handles to values owned by a foreign dynamic runtime
//!
//! A `Val` is a native handle to a value living in a garbage-collected
//! runtime reachable only through the `Boundary` primitives. Native values
//! cross the boundary as fixed-size wire slots described by per-type
//! descriptors; methods are called through generated stubs cached once per
//! signature.
//!
//! ```ignore
//! let _guard = valref::install(HostRuntime::new());
//! let math = Val::global("Math")?;
//! let larger: i32 = math.call("max", (3, 9))?;
//! ```

// Core modules
pub mod binding;
pub mod boundary;
pub mod error;
pub mod val;
pub mod wire;

// Runtime plumbing
pub mod cleanup;
pub mod context;
pub mod stubs;

// Ambient
pub mod config;
pub mod logging;

// Reference runtime
pub mod host;

// Re-export commonly used items
pub use binding::{
    signature, ArgList, BindingType, FromWire, IntoWire, MemoryView, TypeDescriptor, ViewElement,
};
pub use boundary::{Boundary, CleanupToken, MethodStub, RawRef};
pub use config::{BridgeConfig, ConfigError};
pub use context::{
    install, install_with_config, is_installed, stats, BridgeStats, ContextGuard, RuntimeId, RuntimeState,
};
pub use error::{BoundaryError, Result};
pub use host::HostRuntime;
pub use val::{register_symbol, vec_from_array, Val};

use tracing_appender::non_blocking::WorkerGuard;

/// Initialise logging from a loaded configuration
///
/// Returns the writer guard for file output; keep it alive for the life of
/// the process.
pub fn init(config: &BridgeConfig) -> Option<WorkerGuard> {
    logging::init_with_config(config.to_log_config())
}
