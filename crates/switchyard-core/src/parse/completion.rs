//! Which tasks or messages did the backend actually handle?
//!
//! Structured id lists are authoritative. Without them, each candidate id is
//! tested against a few adjacency patterns in the free text and counted at
//! most once. The text is scanned once per call; each id lookup then works
//! from the recorded positions, so the cost does not multiply with the
//! number of ids.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use super::output::ParsedOutput;
use crate::model::{Message, Task};

/// Window, in characters, within which an id and a completion word must
/// appear.
const ADJACENCY_WINDOW: usize = 100;

/// `<id> ... status ... completed`: the gap before and after `status`.
const STATUS_WINDOW: usize = 200;
const STATUS_VALUE_WINDOW: usize = 50;

/// Leading characters of a message used to detect an echoed reply.
const ECHO_PREFIX_CHARS: usize = 40;
const ECHO_MIN_CHARS: usize = 12;

/// Matched against lowercased text.
static COMPLETION_WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:completed|done|finished)\b").expect("valid regex"));

static REPLY_INDICATOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:replied|responded|reply sent|response sent|answered|acknowledged)\b")
        .expect("valid regex")
});

/// Number of `tasks` the output reports as completed.
pub fn count_completed_tasks(parsed: &ParsedOutput, tasks: &[Task]) -> usize {
    let ids = unique_ids(tasks.iter().map(|t| t.id.as_str()));
    match &parsed.tasks_completed {
        Some(reported) => count_reported(&ids, reported),
        None => count_mentioned(&parsed.text, &ids),
    }
}

/// Number of `messages` the output reports as processed.
///
/// Without structured ids or an explicit id mention, reply language or an
/// echo of a message's opening text counts as exactly one processed message.
/// That fallback is an approximation: it reports one even when several
/// messages were handled, and can report one when none was.
pub fn count_processed_messages(parsed: &ParsedOutput, messages: &[Message]) -> usize {
    let ids = unique_ids(messages.iter().map(|m| m.id.as_str()));
    if let Some(reported) = &parsed.messages_processed {
        return count_reported(&ids, reported);
    }
    if messages.is_empty() {
        return 0;
    }

    let scan = CompletionScan::new(&parsed.text);
    let explicit = scan.count(&ids);
    if explicit > 0 {
        return explicit;
    }

    if REPLY_INDICATOR_RE.is_match(&parsed.text) || echoes_any(&scan.text, messages) {
        debug!("no message ids matched; assuming one message was processed");
        return 1;
    }
    0
}

/// Whether `text` says `id` is done, by any of the adjacency patterns.
pub fn mentions_completion(text: &str, id: &str) -> bool {
    CompletionScan::new(text).mentions(id)
}

/// Distinct non-empty ids, first occurrence first.
fn unique_ids<'a>(ids: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
    let mut seen = HashSet::new();
    ids.filter(|id| !id.is_empty() && seen.insert(*id)).collect()
}

/// Count `ids` that appear in the reported list. Unknown reported ids are
/// ignored.
fn count_reported(ids: &[&str], reported: &[String]) -> usize {
    let reported: HashSet<&str> = reported.iter().map(String::as_str).collect();
    ids.iter().filter(|id| reported.contains(*id)).count()
}

fn count_mentioned(text: &str, ids: &[&str]) -> usize {
    if ids.is_empty() {
        return 0;
    }
    CompletionScan::new(text).count(ids)
}

fn is_word(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Positions of everything the adjacency patterns look for, in the
/// lowercased text. All vectors are sorted byte offsets.
struct CompletionScan {
    text: String,
    /// `(start, end)` of each whole-word `completed` / `done` / `finished`.
    words: Vec<(usize, usize)>,
    /// Start of each `[x]` checkbox.
    checkboxes: Vec<usize>,
    newlines: Vec<usize>,
    /// Start of each `status`.
    statuses: Vec<usize>,
    /// Start of each `completed`, word-bounded or not.
    completed: Vec<usize>,
}

impl CompletionScan {
    fn new(text: &str) -> Self {
        let text = text.to_lowercase();
        let words = COMPLETION_WORD_RE
            .find_iter(&text)
            .map(|m| (m.start(), m.end()))
            .collect();
        let starts =
            |needle: &str| -> Vec<usize> { text.match_indices(needle).map(|(i, _)| i).collect() };
        let checkboxes = starts("[x]");
        let newlines = starts("\n");
        let statuses = starts("status");
        let completed = starts("completed");
        Self {
            text,
            words,
            checkboxes,
            newlines,
            statuses,
            completed,
        }
    }

    fn count(&self, ids: &[&str]) -> usize {
        ids.iter().filter(|id| self.mentions(id)).count()
    }

    fn mentions(&self, id: &str) -> bool {
        if id.is_empty() {
            return false;
        }
        let id = id.to_lowercase();
        self.occurrences(&id).any(|(start, end)| {
            // "t1 ... completed"
            self.word_after(end)
                // "completed ... t1"
                || self.word_before(start)
                // "- [x] t1 write docs"
                || self.checkbox_before(start)
                // "id: t1, status: completed"
                || self.status_after(end)
        })
    }

    /// Matches of `id` that are not part of a longer word, so `t1` does not
    /// match inside `t10`.
    fn occurrences<'s>(&'s self, id: &'s str) -> impl Iterator<Item = (usize, usize)> + 's {
        let bound_start = id.chars().next().is_some_and(is_word);
        let bound_end = id.chars().next_back().is_some_and(is_word);
        self.text
            .match_indices(id)
            .map(|(start, m)| (start, start + m.len()))
            .filter(move |&(start, end)| {
                let before_ok =
                    !bound_start || !self.text[..start].chars().next_back().is_some_and(is_word);
                let after_ok = !bound_end || !self.text[end..].chars().next().is_some_and(is_word);
                before_ok && after_ok
            })
    }

    /// Whether `to` is at most `chars` characters past `from`.
    fn within(&self, from: usize, to: usize, chars: usize) -> bool {
        if to < from {
            return false;
        }
        let gap = to - from;
        // A char is 1 to 4 bytes.
        if gap <= chars {
            return true;
        }
        if gap > chars * 4 {
            return false;
        }
        self.text[from..to].chars().count() <= chars
    }

    fn word_after(&self, end: usize) -> bool {
        let next = self.words.partition_point(|&(start, _)| start < end);
        self.words
            .get(next)
            .is_some_and(|&(start, _)| self.within(end, start, ADJACENCY_WINDOW))
    }

    fn word_before(&self, start: usize) -> bool {
        let prev = self.words.partition_point(|&(_, end)| end <= start);
        prev > 0 && self.within(self.words[prev - 1].1, start, ADJACENCY_WINDOW)
    }

    fn checkbox_before(&self, start: usize) -> bool {
        let prev = self.checkboxes.partition_point(|&p| p + 3 <= start);
        if prev == 0 {
            return false;
        }
        let checkbox = self.checkboxes[prev - 1];
        let next_newline = self.newlines.partition_point(|&n| n <= checkbox);
        self.newlines.get(next_newline).is_none_or(|&n| n >= start)
    }

    fn status_after(&self, end: usize) -> bool {
        let first = self.statuses.partition_point(|&s| s < end);
        self.statuses[first..]
            .iter()
            .take_while(|&&s| self.within(end, s, STATUS_WINDOW))
            .any(|&s| {
                let value_from = s + "status".len();
                let next = self.completed.partition_point(|&c| c < value_from);
                self.completed
                    .get(next)
                    .is_some_and(|&c| self.within(value_from, c, STATUS_VALUE_WINDOW))
            })
    }
}

/// `haystack` is already lowercased.
fn echoes_any(haystack: &str, messages: &[Message]) -> bool {
    messages.iter().any(|m| {
        let prefix: String = m
            .content
            .trim()
            .chars()
            .take(ECHO_PREFIX_CHARS)
            .collect::<String>()
            .to_lowercase();
        prefix.chars().count() >= ECHO_MIN_CHARS && haystack.contains(&prefix)
    })
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::model::{TaskPriority, TaskStatus};
    use crate::parse::output::parse_stdout;

    fn task(id: &str) -> Task {
        Task {
            id: id.to_string(),
            title: format!("task {id}"),
            description: String::new(),
            status: TaskStatus::Pending,
            priority: TaskPriority::Medium,
            parent_task_id: None,
            delegated_to: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn message(id: &str, content: &str) -> Message {
        Message {
            id: id.to_string(),
            from: "lead".to_string(),
            to: "agent".to_string(),
            content: content.to_string(),
            channel: "general".to_string(),
            timestamp: Utc::now(),
            read: false,
        }
    }

    fn tasks(ids: &[&str]) -> Vec<Task> {
        ids.iter().map(|id| task(id)).collect()
    }

    #[test]
    fn structured_task_ids_are_authoritative() {
        let parsed = parse_stdout(r#"{"tasksCompleted":["t1","t2"]}"#);
        assert_eq!(count_completed_tasks(&parsed, &tasks(&["t1", "t2", "t3"])), 2);
    }

    #[test]
    fn structured_unknown_ids_are_ignored() {
        let parsed = parse_stdout(r#"{"tasksCompleted":["t1","ghost","t1"]}"#);
        assert_eq!(count_completed_tasks(&parsed, &tasks(&["t1", "t2"])), 1);
    }

    #[test]
    fn structured_empty_list_beats_heuristics() {
        let parsed = parse_stdout(r#"{"text":"t1 completed","tasksCompleted":[]}"#);
        assert_eq!(count_completed_tasks(&parsed, &tasks(&["t1"])), 0);
    }

    #[test]
    fn heuristic_patterns_table() {
        let cases = [
            ("Task t1 has been completed.", true),
            ("t1: done", true),
            ("Finished work on t1 today", true),
            ("- [x] t1 write the docs", true),
            ("- [X] t1 write the docs", true),
            ("id: t1\nstatus: completed", true),
            ("t1 is still in progress", false),
            ("t10 completed", false),
            ("- [ ] t1 write the docs", false),
        ];
        for (text, expected) in cases {
            assert_eq!(mentions_completion(text, "t1"), expected, "text: {text:?}");
        }
    }

    #[test]
    fn completion_word_outside_window_does_not_count() {
        let text = format!("t1 {} completed", "x".repeat(150));
        assert!(!mentions_completion(&text, "t1"));
    }

    #[test]
    fn ids_with_regex_metacharacters_are_escaped() {
        assert!(mentions_completion("task (a+b).1 done", "(a+b).1"));
        assert!(!mentions_completion("task aab11 done", "(a+b).1"));
    }

    #[test]
    fn each_task_counted_once() {
        let parsed = parse_stdout("t1 done. Also t1 completed again. [x] t2");
        assert_eq!(count_completed_tasks(&parsed, &tasks(&["t1", "t2", "t3"])), 2);
    }

    #[test]
    fn duplicate_task_ids_count_once_on_both_paths() {
        let dupes = tasks(&["t1", "t1", "t2"]);
        let structured = parse_stdout(r#"{"tasksCompleted":["t1"]}"#);
        assert_eq!(count_completed_tasks(&structured, &dupes), 1);
        let free_text = parse_stdout("t1 done");
        assert_eq!(count_completed_tasks(&free_text, &dupes), 1);
    }

    #[test]
    fn large_output_with_many_tasks_stays_fast() {
        let ids: Vec<String> = (0..50).map(|i| format!("task-{i}")).collect();
        let mut text = String::new();
        while text.len() < 2_000_000 {
            for id in &ids {
                text.push_str(&format!("Überprüfung für {id} läuft noch, Größe unbekannt. "));
            }
        }
        text.push_str(&".".repeat(200));
        text.push_str(" task-7 finished");

        let all: Vec<Task> = ids.iter().map(|id| task(id)).collect();
        let parsed = parse_stdout(&text);
        let started = std::time::Instant::now();
        assert_eq!(count_completed_tasks(&parsed, &all), 1);
        assert!(
            started.elapsed() < std::time::Duration::from_secs(20),
            "took {:?}",
            started.elapsed()
        );
    }

    #[test]
    fn uppercase_ids_match_case_insensitively() {
        assert!(mentions_completion("TASK-A1 is DONE", "task-a1"));
        assert!(mentions_completion("task-a1 is done", "TASK-A1"));
    }

    #[test]
    fn structured_message_ids() {
        let parsed = parse_stdout(r#"{"messagesProcessed":["m2"]}"#);
        let msgs = vec![message("m1", "hello"), message("m2", "ping")];
        assert_eq!(count_processed_messages(&parsed, &msgs), 1);
    }

    #[test]
    fn explicit_message_id_mentions() {
        let parsed = parse_stdout("Handled m1 (done) and m2 is finished");
        let msgs = vec![message("m1", "a"), message("m2", "b"), message("m3", "c")];
        assert_eq!(count_processed_messages(&parsed, &msgs), 2);
    }

    #[test]
    fn reply_language_counts_exactly_one() {
        let parsed = parse_stdout("I replied to the lead about the deploy.");
        let msgs = vec![message("m1", "a"), message("m2", "b")];
        assert_eq!(count_processed_messages(&parsed, &msgs), 1);
    }

    #[test]
    fn echoed_message_content_counts_one() {
        let parsed = parse_stdout("> Can you review the migration plan for friday\nLooks fine to me.");
        let msgs = vec![message("m1", "Can you review the migration plan for friday's release?")];
        assert_eq!(count_processed_messages(&parsed, &msgs), 1);
    }

    #[test]
    fn no_signal_counts_zero() {
        let parsed = parse_stdout("Nothing to see here.");
        let msgs = vec![message("m1", "short")];
        assert_eq!(count_processed_messages(&parsed, &msgs), 0);
    }

    #[test]
    fn no_messages_never_counts() {
        let parsed = parse_stdout("I replied to everyone");
        assert_eq!(count_processed_messages(&parsed, &[]), 0);
    }
}
