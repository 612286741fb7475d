//! Failed-run interpretation: turn stderr (and, failing that, stdout) into
//! a list of [`ExecutionError`]s.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::model::{ExecutionError, error_codes};

// Error:, ERROR:, TypeError:, FATAL: ... at the start of a line.
static ERROR_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(?:\w*error|fatal):").expect("valid regex"));

/// Interpret a non-zero exit (or signal termination).
///
/// Always returns at least one error.
pub fn parse_failure(
    exit_code: Option<i32>,
    stdout: &str,
    stderr: &str,
    backend: &str,
) -> Vec<ExecutionError> {
    if let Some(errors) = json_errors(stderr)
        .or_else(|| error_lines(stderr))
        .or_else(|| json_errors(stdout))
    {
        return errors;
    }

    let (message, code) = match exit_code {
        Some(code) => (
            format!("{backend} exited with code {code}"),
            error_codes::exit_code(code),
        ),
        None => (
            format!("{backend} was terminated by a signal"),
            error_codes::SIGNAL.to_string(),
        ),
    };
    let error = ExecutionError::new(message).with_code(code);
    if stderr.trim().is_empty() {
        vec![error]
    } else {
        vec![error.with_stack(stderr)]
    }
}

/// JSON objects carrying an `error` field, either as the whole text or one
/// per line. Claude Code's `is_error` result envelope is accepted too.
fn json_errors(text: &str) -> Option<Vec<ExecutionError>> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Some(error) = serde_json::from_str::<Value>(trimmed)
        .ok()
        .as_ref()
        .and_then(error_from_value)
    {
        return Some(vec![error]);
    }
    let errors: Vec<ExecutionError> = trimmed
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with('{'))
        .filter_map(|line| serde_json::from_str::<Value>(line).ok())
        .filter_map(|v| error_from_value(&v))
        .collect();
    (!errors.is_empty()).then_some(errors)
}

fn error_from_value(value: &Value) -> Option<ExecutionError> {
    let obj = value.as_object()?;
    match obj.get("error") {
        Some(Value::String(message)) => {
            let mut error = ExecutionError::new(message.clone());
            error.code = obj.get("code").and_then(code_string);
            Some(error)
        }
        Some(Value::Object(inner)) => {
            let message = inner
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            let mut error = ExecutionError::new(message);
            error.code = inner
                .get("code")
                .or_else(|| inner.get("type"))
                .or_else(|| obj.get("code"))
                .and_then(code_string);
            error.stack = inner
                .get("stack")
                .and_then(Value::as_str)
                .map(str::to_string);
            Some(error)
        }
        Some(_) => None,
        None if obj.get("is_error").and_then(Value::as_bool) == Some(true) => {
            let message = obj
                .get("result")
                .and_then(Value::as_str)
                .unwrap_or("backend reported an error");
            Some(ExecutionError::new(message))
        }
        None => None,
    }
}

fn code_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Lines that look like `Error: ...`, each followed by optional `at ...`
/// stack lines.
fn error_lines(stderr: &str) -> Option<Vec<ExecutionError>> {
    let mut errors: Vec<ExecutionError> = Vec::new();
    let mut stack: Vec<&str> = Vec::new();
    let mut in_error = false;

    for line in stderr.lines() {
        if ERROR_LINE_RE.is_match(line) {
            flush(&mut errors, &mut stack);
            errors.push(ExecutionError::new(line.trim()));
            in_error = true;
        } else if in_error && line.trim_start().starts_with("at ") {
            stack.push(line.trim());
        } else {
            flush(&mut errors, &mut stack);
            in_error = false;
        }
    }
    flush(&mut errors, &mut stack);

    (!errors.is_empty()).then_some(errors)
}

/// Attach pending stack lines to the most recent error.
fn flush(errors: &mut [ExecutionError], stack: &mut Vec<&str>) {
    if let Some(last) = errors.last_mut() {
        if !stack.is_empty() {
            last.stack = Some(stack.join("\n"));
        }
    }
    stack.clear();
}
