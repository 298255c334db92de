//! Integration Test: No Panicking Shortcuts
//!
//! **Policy**: production code propagates errors with `?` or handles them;
//! `unwrap()` and `expect()` are for tests only.

use architectural_enforcement::{production_code, report, CodeLine};

fn is_panicking_shortcut(code: &str) -> bool {
    code.contains(".unwrap()") || code.contains(".expect(")
}

#[test]
fn test_no_unwrap_in_production_code() {
    let violations: Vec<CodeLine> = production_code()
        .into_iter()
        .filter(|line| is_panicking_shortcut(&line.code))
        .collect();

    report(
        "unwrap()/expect() found in production code!",
        &[
            "✅ REQUIRED: propagate with ? or map to a typed error",
            "✅ ACCEPTABLE: unwrap_or, unwrap_or_else, unwrap_or_default",
        ],
        &violations,
    );
}

#[test]
fn test_shortcut_detection() {
    assert!(is_panicking_shortcut("let x = y.unwrap();"));
    assert!(is_panicking_shortcut("let x = y.expect(\"set\");"));
    assert!(!is_panicking_shortcut("let x = y.unwrap_or(0);"));
}
