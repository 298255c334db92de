//! Integration Test: Sleep Prohibition
//!
//! **Policy**: Production code in the pool crates MUST NOT call sleep.
//! Attempt timeouts use `tokio::time::timeout`; nothing polls.
//! **Exceptions**: test code (everything after `#[cfg(test)]`).

use architectural_enforcement::{production_code, report, CodeLine};

fn is_sleep_call(code: &str) -> bool {
    code.contains("::sleep(") || code.contains(".sleep(") || code.contains("sleep_until(")
}

#[test]
fn test_no_sleep_in_production_code() {
    let violations: Vec<CodeLine> = production_code()
        .into_iter()
        .filter(|line| is_sleep_call(&line.code))
        .collect();

    report(
        "Sleep calls found in production code!",
        &[
            "✅ ACCEPTABLE: tokio::time::timeout around a future, test code",
            "❌ FORBIDDEN: sleep in polling loops, sleep as synchronization",
        ],
        &violations,
    );
}

#[test]
fn test_sleep_detection() {
    assert!(is_sleep_call("    tokio::time::sleep(Duration::from_millis(10)).await;"));
    assert!(is_sleep_call("std::thread::sleep(d);"));
    assert!(!is_sleep_call("tokio::time::timeout(self.timeout, fut).await"));
}
