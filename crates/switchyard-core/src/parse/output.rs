//! Successful-run stdout: structured JSON first, regex heuristics last.

use std::sync::LazyLock;

use chrono::{DateTime, TimeZone, Utc};
use regex::Regex;
use serde_json::Value;

use crate::model::ExecutionMetadata;

/// Which parser produced a [`ParsedOutput`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputSource {
    /// The whole of stdout was a JSON object.
    Document,
    /// A fenced ```json block inside otherwise free text.
    Embedded,
    /// Nothing structured; only regex heuristics apply.
    Heuristic,
}

/// Facts recovered from stdout. `None` means "not reported"; heuristics
/// over `text` fill those gaps when metadata is built.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedOutput {
    pub source: OutputSource,
    pub text: String,
    pub api_call_count: Option<u64>,
    pub cost_usd: Option<f64>,
    pub files_created: Option<Vec<String>>,
    pub files_modified: Option<Vec<String>>,
    pub tasks_completed: Option<Vec<String>>,
    pub messages_processed: Option<Vec<String>>,
    pub next_execution: Option<DateTime<Utc>>,
}

impl ParsedOutput {
    fn heuristic(text: &str) -> Self {
        Self {
            source: OutputSource::Heuristic,
            text: text.to_string(),
            api_call_count: None,
            cost_usd: None,
            files_created: None,
            files_modified: None,
            tasks_completed: None,
            messages_processed: None,
            next_execution: None,
        }
    }

    /// Build result metadata, using heuristics for anything the structured
    /// output did not report. `raw` is stored as the output verbatim.
    pub fn to_metadata(&self, raw: &str) -> ExecutionMetadata {
        ExecutionMetadata {
            files_created: self
                .files_created
                .clone()
                .unwrap_or_else(|| extract_file_list(&CREATED_FILES_RE, &self.text)),
            files_modified: self
                .files_modified
                .clone()
                .unwrap_or_else(|| extract_file_list(&MODIFIED_FILES_RE, &self.text)),
            api_call_count: self
                .api_call_count
                .or_else(|| extract_api_calls(&self.text))
                .unwrap_or(0),
            cost_usd: self.cost_usd.unwrap_or(0.0),
            output: raw.to_string(),
        }
    }
}

/// Ordered chain of confident parsers; the first `Some` wins.
const STRUCTURED_PARSERS: &[fn(&str) -> Option<ParsedOutput>] =
    &[parse_json_document, parse_fenced_json];

/// Interpret stdout of a successful run. Never fails.
pub fn parse_stdout(stdout: &str) -> ParsedOutput {
    STRUCTURED_PARSERS
        .iter()
        .find_map(|parser| parser(stdout))
        .unwrap_or_else(|| ParsedOutput::heuristic(stdout))
}

/// The whole of stdout is a JSON object.
///
/// Accepts the plain shape (`text`, `apiCallCount`, `costUSD`, ...) and the
/// Claude Code result envelope (`result`, `total_cost_usd`, `num_turns`),
/// including an envelope whose `result` string is itself the plain shape.
pub fn parse_json_document(stdout: &str) -> Option<ParsedOutput> {
    let trimmed = stdout.trim();
    if !trimmed.starts_with('{') {
        return None;
    }
    let value: Value = serde_json::from_str(trimmed).ok()?;
    if !value.is_object() {
        return None;
    }
    let mut parsed = from_object(&value, stdout, OutputSource::Document);

    // Envelope whose result text is itself structured output.
    if value.get("text").is_none() {
        if let Some(inner) = value
            .get("result")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| s.starts_with('{'))
            .and_then(|s| serde_json::from_str::<Value>(s).ok())
            .filter(Value::is_object)
        {
            let inner = from_object(&inner, &parsed.text, OutputSource::Document);
            parsed = merge(inner, parsed);
        }
    }
    Some(parsed)
}

/// A fenced ```json block in free text. Only confident when the block
/// carries at least one known field.
pub fn parse_fenced_json(stdout: &str) -> Option<ParsedOutput> {
    let value = FENCED_JSON_RE
        .captures_iter(stdout)
        .filter_map(|caps| serde_json::from_str::<Value>(caps.get(1)?.as_str()).ok())
        .filter(|v| v.is_object() && KNOWN_KEYS.iter().any(|k| v.get(k).is_some()))
        .last()?;
    let mut parsed = from_object(&value, stdout, OutputSource::Embedded);
    if value.get("text").is_none() {
        parsed.text = stdout.to_string();
    }
    Some(parsed)
}

const KNOWN_KEYS: &[&str] = &[
    "text",
    "apiCallCount",
    "costUSD",
    "filesCreated",
    "filesModified",
    "tasksCompleted",
    "messagesProcessed",
    "nextExecution",
];

fn from_object(value: &Value, raw: &str, source: OutputSource) -> ParsedOutput {
    let text = first_str(value, &["text", "result"])
        .map(str::to_string)
        .unwrap_or_else(|| raw.to_string());
    ParsedOutput {
        source,
        text,
        api_call_count: first_u64(value, &["apiCallCount", "api_call_count", "num_turns"]),
        cost_usd: first_f64(value, &["costUSD", "cost_usd", "total_cost_usd"]),
        files_created: string_list(value, &["filesCreated", "files_created"]),
        files_modified: string_list(value, &["filesModified", "files_modified"]),
        tasks_completed: string_list(value, &["tasksCompleted", "tasks_completed"]),
        messages_processed: string_list(value, &["messagesProcessed", "messages_processed"]),
        next_execution: value
            .get("nextExecution")
            .or_else(|| value.get("next_execution"))
            .and_then(parse_timestamp),
    }
}

/// Field-wise merge; `primary` wins where it has a value.
fn merge(primary: ParsedOutput, secondary: ParsedOutput) -> ParsedOutput {
    ParsedOutput {
        source: primary.source,
        text: primary.text,
        api_call_count: primary.api_call_count.or(secondary.api_call_count),
        cost_usd: primary.cost_usd.or(secondary.cost_usd),
        files_created: primary.files_created.or(secondary.files_created),
        files_modified: primary.files_modified.or(secondary.files_modified),
        tasks_completed: primary.tasks_completed.or(secondary.tasks_completed),
        messages_processed: primary.messages_processed.or(secondary.messages_processed),
        next_execution: primary.next_execution.or(secondary.next_execution),
    }
}

fn first_str<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|k| value.get(*k).and_then(Value::as_str))
}

fn first_u64(value: &Value, keys: &[&str]) -> Option<u64> {
    keys.iter().find_map(|k| {
        let v = value.get(*k)?;
        v.as_u64()
            .or_else(|| v.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
    })
}

fn first_f64(value: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter()
        .find_map(|k| value.get(*k).and_then(Value::as_f64))
        .filter(|f| f.is_finite() && *f >= 0.0)
}

/// Array of strings (numbers are stringified so numeric ids still match).
/// Anything else is treated as absent.
fn string_list(value: &Value, keys: &[&str]) -> Option<Vec<String>> {
    let items = keys.iter().find_map(|k| value.get(*k).and_then(Value::as_array))?;
    Some(
        items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect(),
    )
}

/// RFC 3339 string or epoch milliseconds.
fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => n
            .as_i64()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Heuristics
// ---------------------------------------------------------------------------

static FENCED_JSON_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```json\s*(\{.*?\})\s*```").expect("valid regex"));

// The list is the rest of the line plus any bullet lines that follow.
static CREATED_FILES_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)created\s+files?\s*:[ \t]*(.*(?:\n[ \t]*[-*][ \t]+.*)*)")
        .expect("valid regex")
});

static MODIFIED_FILES_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)(?:modified|updated|edited)\s+files?\s*:[ \t]*(.*(?:\n[ \t]*[-*][ \t]+.*)*)")
        .expect("valid regex")
});

static API_CALLS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+)\s+api\s+calls?").expect("valid regex"));

fn extract_file_list(re: &Regex, text: &str) -> Vec<String> {
    let mut files: Vec<String> = Vec::new();
    for caps in re.captures_iter(text) {
        let Some(list) = caps.get(1) else { continue };
        for item in list.as_str().split([',', '\n']) {
            let cleaned = item
                .trim()
                .trim_start_matches(['-', '*'])
                .trim()
                .trim_matches(['`', '"', '\''])
                .trim_end_matches('.')
                .trim();
            if !cleaned.is_empty() && !files.iter().any(|f| f == cleaned) {
                files.push(cleaned.to_string());
            }
        }
    }
    files
}

fn extract_api_calls(text: &str) -> Option<u64> {
    API_CALLS_RE
        .captures(text)
        .and_then(|caps| caps.get(1)?.as_str().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_structured_document() {
        let stdout = r#"{"text":"all done","apiCallCount":4,"costUSD":0.12,
            "filesCreated":["a.rs"],"filesModified":["b.rs","c.rs"],
            "tasksCompleted":["t1"],"nextExecution":"2026-10-18T09:00:00Z"}"#;
        let parsed = parse_stdout(stdout);
        assert_eq!(parsed.source, OutputSource::Document);
        assert_eq!(parsed.text, "all done");
        assert_eq!(parsed.api_call_count, Some(4));
        assert_eq!(parsed.cost_usd, Some(0.12));
        assert_eq!(parsed.tasks_completed, Some(vec!["t1".to_string()]));
        assert_eq!(
            parsed.next_execution.unwrap().to_rfc3339(),
            "2026-10-18T09:00:00+00:00"
        );
        let meta = parsed.to_metadata(stdout);
        assert_eq!(meta.files_created, vec!["a.rs"]);
        assert_eq!(meta.files_modified, vec!["b.rs", "c.rs"]);
        assert_eq!(meta.output, stdout);
    }

    #[test]
    fn claude_envelope_with_plain_result() {
        let stdout = r#"{"type":"result","subtype":"success","result":"Created files: src/x.rs, src/y.rs","total_cost_usd":0.5,"num_turns":7}"#;
        let parsed = parse_stdout(stdout);
        assert_eq!(parsed.text, "Created files: src/x.rs, src/y.rs");
        assert_eq!(parsed.cost_usd, Some(0.5));
        assert_eq!(parsed.api_call_count, Some(7));
        let meta = parsed.to_metadata(stdout);
        assert_eq!(meta.files_created, vec!["src/x.rs", "src/y.rs"]);
    }

    #[test]
    fn claude_envelope_wrapping_structured_result() {
        let stdout = r#"{"type":"result","result":"{\"text\":\"inner\",\"tasksCompleted\":[\"t9\"]}","total_cost_usd":0.25}"#;
        let parsed = parse_stdout(stdout);
        assert_eq!(parsed.text, "inner");
        assert_eq!(parsed.tasks_completed, Some(vec!["t9".to_string()]));
        assert_eq!(parsed.cost_usd, Some(0.25));
    }

    #[test]
    fn malformed_json_falls_back_to_heuristics() {
        let parsed = parse_stdout("{ invalid json }");
        assert_eq!(parsed.source, OutputSource::Heuristic);
        assert_eq!(parsed.text, "{ invalid json }");
    }

    #[test]
    fn json_array_is_not_structured() {
        let parsed = parse_stdout(r#"["t1"]"#);
        assert_eq!(parsed.source, OutputSource::Heuristic);
    }

    #[test]
    fn empty_stdout_is_heuristic_with_empty_metadata() {
        let parsed = parse_stdout("");
        assert_eq!(parsed.source, OutputSource::Heuristic);
        let meta = parsed.to_metadata("");
        assert!(meta.files_created.is_empty());
        assert_eq!(meta.api_call_count, 0);
    }

    #[test]
    fn wrong_field_types_are_treated_as_absent() {
        let stdout = r#"{"text":"x","filesCreated":"not-a-list","costUSD":"free","nextExecution":"soon"}"#;
        let parsed = parse_stdout(stdout);
        assert_eq!(parsed.source, OutputSource::Document);
        assert_eq!(parsed.files_created, None);
        assert_eq!(parsed.cost_usd, None);
        assert_eq!(parsed.next_execution, None);
    }

    #[test]
    fn fenced_json_block_in_free_text() {
        let stdout = "Work finished.\n```json\n{\"tasksCompleted\": [\"t2\"], \"apiCallCount\": 3}\n```\nBye";
        let parsed = parse_stdout(stdout);
        assert_eq!(parsed.source, OutputSource::Embedded);
        assert_eq!(parsed.tasks_completed, Some(vec!["t2".to_string()]));
        assert_eq!(parsed.api_call_count, Some(3));
        assert_eq!(parsed.text, stdout);
    }

    #[test]
    fn fenced_block_without_known_keys_is_ignored() {
        let stdout = "Here is config:\n```json\n{\"port\": 8080}\n```";
        assert_eq!(parse_stdout(stdout).source, OutputSource::Heuristic);
    }

    #[test]
    fn heuristic_file_lists_and_api_calls() {
        let text = "Summary\nCreated files: src/main.rs, `src/lib.rs`\n\
                    Modified files:\n- Cargo.toml\n- README.md\n\
                    Edited file: docs/guide.md\n\
                    Used 12 API calls in total.";
        let meta = parse_stdout(text).to_metadata(text);
        assert_eq!(meta.files_created, vec!["src/main.rs", "src/lib.rs"]);
        assert_eq!(
            meta.files_modified,
            vec!["Cargo.toml", "README.md", "docs/guide.md"]
        );
        assert_eq!(meta.api_call_count, 12);
    }

    #[test]
    fn single_api_call_singular() {
        assert_eq!(extract_api_calls("made 1 api call"), Some(1));
        assert_eq!(extract_api_calls("no calls at all"), None);
    }

    #[test]
    fn epoch_millis_next_execution() {
        let parsed = parse_stdout(r#"{"nextExecution": 0}"#);
        assert_eq!(parsed.next_execution, Utc.timestamp_millis_opt(0).single());
    }

    #[test]
    fn non_ascii_and_large_output_do_not_panic() {
        let mut big = String::from("résumé ✓ 完成 ");
        big.push_str(&"x".repeat(3 * 1024 * 1024));
        big.push_str("\ncreated file: données.txt");
        let parsed = parse_stdout(&big);
        assert_eq!(parsed.source, OutputSource::Heuristic);
        let meta = parsed.to_metadata(&big);
        assert_eq!(meta.files_created, vec!["données.txt"]);
    }
}
