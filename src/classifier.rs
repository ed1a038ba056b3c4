//! Error Classifier
//!
//! Turns raw sandbox stderr/exit diagnostics (compiler output, runtime
//! stack traces, arbitrary process noise) into one short, deterministic
//! message an agent can act on. Pure string scanning, no I/O. Priority
//! order: a transpiler's structured diagnostic outranks a bare location
//! line, which outranks a generic `Error:` line, which outranks "whatever
//! stderr happened to contain".

use crate::error::PtcError;

/// Example shape this recognizes:
/// ```text
/// Transform failed with 1 error:
/// main.ts:12:5: ERROR: Unexpected token
/// ```
fn transpiler_diagnostic(stderr: &str) -> Option<PtcError> {
    let lines: Vec<&str> = stderr.lines().collect();
    let header_idx = lines.iter().position(|l| {
        let l = l.trim();
        l.starts_with("Transform failed with") && l.contains("error")
    })?;

    for line in &lines[header_idx + 1..] {
        if let Some((location, message)) = parse_location_line(line) {
            return Some(PtcError::Compilation { location, message: with_brace_hint(message) });
        }
    }
    None
}

/// Transpiler diagnostics this loosely, e.g. `Unexpected "}"` or a bare
/// `Expected ...`, are frequently a downstream symptom of an unbalanced
/// brace; append a hint pointing the agent back at its own source rather
/// than the transpiler's token-level complaint.
fn with_brace_hint(message: String) -> String {
    let lower = message.to_lowercase();
    let looks_brace_related = lower.contains("unexpected catch")
        || lower.contains("unexpected \"}\"")
        || lower.contains("unexpected }")
        || lower.starts_with("expected");
    if looks_brace_related {
        format!("{message} (hint: check for unbalanced braces in the submitted code)")
    } else {
        message
    }
}

/// `<file>:<line>:<col>: ERROR: <message>` or `<file>:<line>:<col>: <message>`.
fn parse_location_line(line: &str) -> Option<(String, String)> {
    let line = line.trim();
    let mut parts = line.splitn(2, ": ");
    let location = parts.next()?;
    let rest = parts.next()?;
    if !is_location_token(location) {
        return None;
    }
    let message = rest.strip_prefix("ERROR: ").unwrap_or(rest);
    Some((location.to_string(), message.to_string()))
}

fn is_location_token(token: &str) -> bool {
    let segments: Vec<&str> = token.rsplitn(3, ':').collect();
    segments.len() == 3 && segments[0].parse::<u32>().is_ok() && segments[1].parse::<u32>().is_ok()
}

/// A standalone `<path>:<line>:<col>: ERROR: <msg>` line with no preceding
/// `Transform failed with N error(s):` header.
fn standalone_location_line(stderr: &str) -> Option<PtcError> {
    for line in stderr.lines() {
        if let Some((location, message)) = parse_location_line(line) {
            return Some(PtcError::Compilation { location, message: with_brace_hint(message) });
        }
    }
    None
}

/// A bare `<Kind>Error: <message>` line anywhere in stderr, e.g.
/// `TypeError: x is not a function`.
fn kind_error_line(stderr: &str) -> Option<PtcError> {
    for line in stderr.lines() {
        let trimmed = line.trim();
        if let Some(colon) = trimmed.find(':') {
            let (kind, rest) = trimmed.split_at(colon);
            if kind.ends_with("Error") && kind.chars().all(|c| c.is_alphanumeric()) && !kind.is_empty() {
                let message = rest.trim_start_matches(':').trim();
                return Some(PtcError::Runtime(message.to_string()));
            }
        }
    }
    None
}

/// A generic `Error: <message>` line.
fn generic_error_line(stderr: &str) -> Option<PtcError> {
    for line in stderr.lines() {
        let trimmed = line.trim();
        if let Some(rest) = trimmed.strip_prefix("Error:") {
            let message = rest.trim();
            if !message.is_empty() {
                return Some(PtcError::Runtime(message.to_string()));
            }
        }
    }
    None
}

/// Last resort: collapse stderr to its final non-blank line, stripped of
/// stack-trace noise (`    at ...` frames), so the agent gets *something*
/// short rather than a raw multi-kilobyte dump.
fn fallback(stderr: &str) -> PtcError {
    let meaningful = stderr
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with("at "))
        .last()
        .unwrap_or("sandbox exited with an error")
        .to_string();
    PtcError::Runtime(meaningful)
}

/// Classify a sandbox failure from its stderr into a single `PtcError`,
/// trying each recognizer in priority order before falling back.
pub fn classify(stderr: &str) -> PtcError {
    transpiler_diagnostic(stderr)
        .or_else(|| standalone_location_line(stderr))
        .or_else(|| kind_error_line(stderr))
        .or_else(|| generic_error_line(stderr))
        .unwrap_or_else(|| fallback(stderr))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_transpiler_diagnostic() {
        let stderr = "Transform failed with 1 error:\nmain.ts:12:5: ERROR: Unexpected token\n";
        let err = classify(stderr);
        match err {
            PtcError::Compilation { location, message } => {
                assert_eq!(location, "main.ts:12:5");
                assert_eq!(message, "Unexpected token");
            }
            other => panic!("expected Compilation, got {other:?}"),
        }
    }

    #[test]
    fn recognizes_kind_error_line() {
        let stderr = "some noise\nTypeError: x is not a function\nmore noise";
        let err = classify(stderr);
        assert!(matches!(err, PtcError::Runtime(ref m) if m == "x is not a function"));
    }

    #[test]
    fn recognizes_generic_error_line() {
        let stderr = "Error: something broke";
        let err = classify(stderr);
        assert!(matches!(err, PtcError::Runtime(ref m) if m == "something broke"));
    }

    #[test]
    fn falls_back_to_last_meaningful_line_stripping_stack_frames() {
        let stderr = "boom happened\n    at foo (main.js:1:1)\n    at bar (main.js:2:2)";
        let err = classify(stderr);
        assert!(matches!(err, PtcError::Runtime(ref m) if m == "boom happened"));
    }

    #[test]
    fn transpiler_diagnostic_takes_priority_over_generic_error() {
        let stderr = "Transform failed with 1 error:\nmain.ts:1:1: ERROR: bad\nError: should be ignored";
        let err = classify(stderr);
        assert!(matches!(err, PtcError::Compilation { .. }));
    }

    #[test]
    fn empty_stderr_yields_generic_fallback() {
        let err = classify("");
        assert!(matches!(err, PtcError::Runtime(ref m) if m == "sandbox exited with an error"));
    }

    #[test]
    fn recognizes_standalone_location_line_without_header() {
        let stderr = "main.ts:3:1: ERROR: Unexpected \"}\"";
        let err = classify(stderr);
        match err {
            PtcError::Compilation { location, message } => {
                assert_eq!(location, "main.ts:3:1");
                assert!(message.starts_with("Unexpected \"}\""));
                assert!(message.contains("unbalanced braces"));
            }
            other => panic!("expected Compilation, got {other:?}"),
        }
    }

    #[test]
    fn brace_related_transpiler_message_gets_a_hint() {
        let stderr = "Transform failed with 1 error:\nmain.ts:2:1: ERROR: Expected \";\" but found \"}\"";
        let err = classify(stderr);
        match err {
            PtcError::Compilation { message, .. } => assert!(message.contains("hint")),
            other => panic!("expected Compilation, got {other:?}"),
        }
    }

    #[test]
    fn plain_unexpected_token_message_is_not_treated_as_brace_related() {
        let stderr = "Transform failed with 1 error:\nmain.ts:12:5: ERROR: Unexpected token";
        let err = classify(stderr);
        match err {
            PtcError::Compilation { message, .. } => assert_eq!(message, "Unexpected token"),
            other => panic!("expected Compilation, got {other:?}"),
        }
    }
}
