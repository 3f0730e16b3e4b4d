//! Source-tree checks for the client core.
//!
//! The core is async end to end and UI-agnostic; these tests scan the
//! source tree so a violation fails CI instead of surfacing as a stalled
//! runtime or an accidental framework dependency.

use architectural_enforcement::core_sources;

/// Substrings that must never appear in the core's sources, with the rule
/// they enforce.
const FORBIDDEN: &[(&str, &str)] = &[
    (
        "std::thread::sleep",
        "blocking sleep stalls the async runtime; use tokio::time::sleep",
    ),
    (
        "reqwest::blocking",
        "the core is async end to end; blocking HTTP is not allowed",
    ),
    ("ratatui", "UI frameworks must not leak into the core"),
    ("crossterm", "UI frameworks must not leak into the core"),
    ("dioxus", "UI frameworks must not leak into the core"),
];

#[test]
fn core_sources_exist() {
    let sources = core_sources();
    assert!(
        sources.len() >= 5,
        "expected the client core source tree, found {} files",
        sources.len()
    );
}

#[test]
fn no_forbidden_calls_in_core() {
    let mut violations = Vec::new();

    for (path, text) in core_sources() {
        for (needle, rule) in FORBIDDEN {
            for (lineno, line) in text.lines().enumerate() {
                if line.contains(needle) {
                    violations.push(format!(
                        "{}:{}: `{}` ({})",
                        path.display(),
                        lineno + 1,
                        needle,
                        rule
                    ));
                }
            }
        }
    }

    assert!(
        violations.is_empty(),
        "architectural violations found:\n{}",
        violations.join("\n")
    );
}

#[test]
fn queue_state_is_lock_protected() {
    // The scheduler's shared state must stay behind a mutex; a bare static
    // or thread-unsafe cell would reintroduce the data races the design
    // rules out.
    let sources = core_sources();
    let scheduler = sources
        .iter()
        .find(|(path, _)| path.ends_with("scheduler.rs"))
        .map(|(_, text)| text)
        .expect("scheduler module present");

    assert!(
        scheduler.contains("Mutex<QueueState>"),
        "scheduler queue state should be mutex-protected"
    );
    assert!(
        !scheduler.contains("static mut"),
        "scheduler must not use static mutable state"
    );
}
