//! Advisory scan for suspicious code patterns.
//!
//! The remote sandbox is isolated, so a hit never blocks execution; it is
//! logged as a monitoring signal only.

/// Substrings that warrant a log line when they appear in submitted code.
const SUSPICIOUS_PATTERNS: &[&str] = &["import os", "subprocess", "eval(", "exec(", "__import__"];

/// Scan `code` for suspicious patterns, logging a warning per hit.
///
/// Returns the matched patterns so callers can surface them alongside the
/// execution result if they want to.
#[must_use]
pub fn scan(code: &str) -> Vec<&'static str> {
    let lowered = code.to_lowercase();
    let hits: Vec<&'static str> = SUSPICIOUS_PATTERNS
        .iter()
        .copied()
        .filter(|pattern| lowered.contains(pattern))
        .collect();
    for pattern in hits.iter().copied() {
        tracing::warn!(pattern, "potentially dangerous pattern detected");
    }
    hits
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_code_has_no_hits() {
        assert!(scan("import pandas as pd\nprint(df.describe())").is_empty());
    }

    #[test]
    fn matches_are_case_insensitive() {
        let hits = scan("IMPORT OS\nsubprocess.run(['ls'])");
        assert!(hits.contains(&"import os"));
        assert!(hits.contains(&"subprocess"));
    }

    #[test]
    fn eval_call_is_flagged() {
        assert_eq!(scan("x = eval(user_input)"), vec!["eval("]);
    }
}
