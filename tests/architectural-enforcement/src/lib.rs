//! Architectural Enforcement Integration Tests
//!
//! Source-level checks over the production code of the pool crates:
//! - No sleep() calls; waits happen on I/O or timers owned by tokio
//! - No blocking I/O inside async functions
//! - No unwrap()/expect() outside tests
//!
//! This library holds the shared scanning helpers; the checks live in
//! `tests/`.

use std::fs;
use std::path::{Path, PathBuf};

/// Production source trees, relative to the workspace root
pub const PRODUCTION_DIRS: &[&str] = &["pool/core/src", "pool/cli/src"];

/// One line of production code with comments removed
#[derive(Debug)]
pub struct CodeLine {
    /// File the line came from
    pub path: PathBuf,
    /// 1-based line number
    pub number: usize,
    /// Line text before any `//`
    pub code: String,
    /// Whether the enclosing function is `async`
    pub in_async_fn: bool,
}

impl std::fmt::Display for CodeLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{} - {}", self.path.display(), self.number, self.code.trim())
    }
}

/// Workspace root, independent of the directory tests are run from
#[must_use]
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../..")
}

/// Every `.rs` file under the production directories
#[must_use]
pub fn production_files() -> Vec<PathBuf> {
    let root = workspace_root();
    let mut files = Vec::new();

    for dir in PRODUCTION_DIRS {
        let path = root.join(dir);
        if !path.exists() {
            continue;
        }
        for entry in walkdir::WalkDir::new(path)
            .into_iter()
            .filter_map(Result::ok)
        {
            if entry.path().extension().and_then(|s| s.to_str()) == Some("rs") {
                files.push(entry.into_path());
            }
        }
    }
    files
}

/// Production lines of one source text.
///
/// Scanning stops at the first `#[cfg(test)]`; test modules sit at the end
/// of each file.
#[must_use]
pub fn code_lines(path: &Path, content: &str) -> Vec<CodeLine> {
    let mut lines = Vec::new();
    let mut in_async_fn = false;

    for (idx, line) in content.lines().enumerate() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("#[cfg(test)]") {
            break;
        }

        let code = line.split("//").next().unwrap_or(line);
        if let Some(is_async) = declared_fn(code) {
            in_async_fn = is_async;
        }

        lines.push(CodeLine {
            path: path.to_path_buf(),
            number: idx + 1,
            code: code.to_string(),
            in_async_fn,
        });
    }
    lines
}

/// `Some(is_async)` when the line starts a function item
fn declared_fn(code: &str) -> Option<bool> {
    let mut rest = code.trim_start();
    let mut is_async = false;

    loop {
        if rest.starts_with("fn ") {
            return Some(is_async);
        }
        if let Some(tail) = rest.strip_prefix("async ") {
            is_async = true;
            rest = tail;
            continue;
        }
        let qualifier = ["pub(crate) ", "pub ", "const ", "unsafe "]
            .iter()
            .find_map(|q| rest.strip_prefix(q));
        match qualifier {
            Some(tail) => rest = tail,
            None => return None,
        }
    }
}

/// Production lines of every production file
#[must_use]
pub fn production_code() -> Vec<CodeLine> {
    production_files()
        .iter()
        .filter_map(|path| {
            fs::read_to_string(path)
                .ok()
                .map(|content| code_lines(path, &content))
        })
        .flatten()
        .collect()
}

/// Fail with a readable report when `violations` is not empty
///
/// # Panics
///
/// Panics when any violation was found.
pub fn report(title: &str, guidance: &[&str], violations: &[CodeLine]) {
    if violations.is_empty() {
        return;
    }

    eprintln!("\n❌ CRITICAL: {title}\n");
    for violation in violations {
        eprintln!("  ❌ {violation}");
    }
    eprintln!();
    for line in guidance {
        eprintln!("  {line}");
    }

    panic!(
        "\nFound {} violation(s) in production code.\nFix these before merging!",
        violations.len()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_lines_stop_at_test_module() {
        let source = "fn a() {}\n#[cfg(test)]\nmod tests { fn b() { x.unwrap(); } }\n";
        let lines = code_lines(Path::new("x.rs"), source);
        assert_eq!(lines.len(), 1);
    }

    #[test]
    fn test_tracks_async_functions() {
        let source = "\
pub async fn save() {
    tokio::fs::write(p, b).await;
}
fn load() {
    std::fs::read(p);
}";
        let lines = code_lines(Path::new("x.rs"), source);
        assert!(lines[1].in_async_fn);
        assert!(!lines[4].in_async_fn);
    }

    #[test]
    fn test_comments_are_stripped() {
        let lines = code_lines(Path::new("x.rs"), "let a = 1; // x.unwrap()");
        assert!(!lines[0].code.contains("unwrap"));
    }

    #[test]
    fn test_workspace_root_contains_pool() {
        assert!(workspace_root().join("pool/core/src/lib.rs").exists());
    }
}
