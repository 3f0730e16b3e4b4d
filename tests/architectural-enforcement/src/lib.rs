//! Architectural Enforcement Integration Tests
//!
//! This package contains integration tests that enforce architectural
//! principles on the client core:
//! - No blocking sleeps or blocking HTTP in async production code
//! - No UI-framework dependencies in the core
//!
//! These tests are designed to catch violations early in the development
//! cycle. The checks themselves live in `tests/source_tree.rs`.

use std::fs;
use std::path::PathBuf;

use walkdir::WalkDir;

/// Root of the client core's source tree, relative to this package.
#[must_use]
pub fn core_src_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../client/core/src")
}

/// Every Rust source file of the client core, with its contents.
#[must_use]
pub fn core_sources() -> Vec<(PathBuf, String)> {
    WalkDir::new(core_src_dir())
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "rs"))
        .map(|entry| {
            let text = fs::read_to_string(entry.path()).expect("source file should be readable");
            (entry.into_path(), text)
        })
        .collect()
}
