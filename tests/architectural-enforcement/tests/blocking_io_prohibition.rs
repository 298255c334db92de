//! Integration Test: Blocking I/O Prohibition
//!
//! **Policy**: async functions in the pool crates MUST NOT use blocking I/O.
//! **Required**: `tokio::fs` and `tokio::io` inside async code.
//! **Acceptable**: blocking reads in synchronous functions that run before
//! the pool serves requests (config loading, stats loading at build time).

use architectural_enforcement::{production_code, report, CodeLine};

const BLOCKING_PATTERNS: &[&str] = &[
    "std::fs::",
    "std::io::stdin",
    "std::io::Read",
    "std::net::",
    "std::process::Command",
    "reqwest::blocking",
    "std::thread::sleep",
];

fn is_blocking(code: &str) -> bool {
    BLOCKING_PATTERNS.iter().any(|pattern| code.contains(pattern))
}

#[test]
fn test_no_blocking_io_in_async_code() {
    let violations: Vec<CodeLine> = production_code()
        .into_iter()
        .filter(|line| line.in_async_fn && is_blocking(&line.code))
        .collect();

    report(
        "Blocking I/O calls found in async production code!",
        &[
            "✅ REQUIRED: tokio::fs::read().await, tokio::fs::write().await",
            "✅ REQUIRED: tokio::io::stdin() with AsyncReadExt",
            "✅ ACCEPTABLE: blocking reads in non-async setup functions",
        ],
        &violations,
    );
}

#[test]
fn test_blocking_detection() {
    assert!(is_blocking("let raw = std::fs::read_to_string(&path)?;"));
    assert!(is_blocking("let client = reqwest::blocking::Client::new();"));
    assert!(!is_blocking("tokio::fs::rename(&staging, &self.path).await"));
}
