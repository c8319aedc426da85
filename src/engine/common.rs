// src/engine/common.rs
//
// Common utilities shared across engine modules.

use crate::error::HeifError;
use std::panic::{catch_unwind, AssertUnwindSafe};

pub type EngineResult<T> = std::result::Result<T, HeifError>;

/// Run a call into the native codec, turning a panic into `InternalPanic`.
///
/// Values owned by the closure are dropped during unwinding, so a native
/// context moved into or created inside `f` is still released exactly once.
pub fn run_native<T>(label: &'static str, f: impl FnOnce() -> T) -> EngineResult<T> {
    catch_unwind(AssertUnwindSafe(f)).map_err(|payload| {
        let detail = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic payload".to_string());
        HeifError::internal_panic(format!("{label}: native call panicked: {detail}"))
    })
}
