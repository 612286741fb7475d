//! Interpretation of backend output.
//!
//! Every parser here is a pure function over strings. Structured parsers
//! return `Some` only when confident; callers walk them in order and fall
//! back to heuristics, so interpretation itself can never fail.
//!
//! ```text
//! exit 0   -> output::parse_stdout     (JSON document -> fenced JSON -> heuristics)
//!          -> completion::count_*      (structured ids -> adjacency regexes)
//! exit !=0 -> errors::parse_failure    (JSON errors -> error lines -> raw stderr)
//! ```

pub mod completion;
pub mod errors;
pub mod output;

pub use completion::{count_completed_tasks, count_processed_messages};
pub use errors::parse_failure;
pub use output::{OutputSource, ParsedOutput, parse_stdout};
