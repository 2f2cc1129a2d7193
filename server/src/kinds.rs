//! Job kinds served out of the box.
//!
//! Real deployments register their own computations; these two cover the synchronous path and
//! the background path end to end.

mod echo;
mod sleep;

pub use echo::Echo;
pub use sleep::Sleep;

use joblib::{JobSpec, Registry};
use std::path::Path;

/// Every kind gets `output_root/<kind>` as its root.
pub fn registry(output_root: &Path) -> Registry {
    Registry::new()
        .register(JobSpec::new("Echo", Echo, output_root.join("echo")).without_work_dir())
        .register(JobSpec::new("Sleep", Sleep, output_root.join("sleep")).asynchronous())
}

/// Reduce a client supplied file name to something safe to use as a single path component.
pub fn secure_filename(name: &str) -> String {
    let base = name.rsplit(|c| c == '/' || c == '\\').next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}
