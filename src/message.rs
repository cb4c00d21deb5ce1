//! Line protocol definitions
//!
//! Exact prompt strings, server notices and chat line formatting.
//! Everything on the wire is newline-terminated UTF-8 text, except the
//! name prompt which leaves the cursor on the same line.

use chrono::{Local, NaiveDateTime};

/// Sent once, before the first name prompt
pub const BANNER: &str = "Welcome to TCP-Chat!\n";

/// Name prompt (no trailing newline)
pub const NAME_PROMPT: &str = "Enter your name: ";

/// Sent when the requested name is held by another session
pub const DUPLICATE_NAME: &str = "Please, provide a unique name\n";

/// Sent when the name line is empty after trimming
pub const EMPTY_NAME: &str = "Please, provide non-empty name\n";

/// Timestamp layout used in chat lines
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Server-generated presence notices
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerNotice<'a> {
    Joined(&'a str),
    Left(&'a str),
}

impl std::fmt::Display for ServerNotice<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerNotice::Joined(name) => write!(f, "[Server] {} joined the chat", name),
            ServerNotice::Left(name) => write!(f, "[Server] {} left the chat", name),
        }
    }
}

/// Format a chat line as `[timestamp][name]: text`
pub fn format_chat_line(at: NaiveDateTime, name: &str, text: &str) -> String {
    format!("[{}][{}]: {}", at.format(TIMESTAMP_FORMAT), name, text)
}

/// Clock trait so chat timestamps can be pinned in tests
pub trait Clock: Send + Sync {
    /// Current local wall-clock time
    fn now(&self) -> NaiveDateTime;
}

/// System clock (local time zone)
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Clock that always returns the same instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    fixed: NaiveDateTime,
}

impl FixedClock {
    pub fn new(fixed: NaiveDateTime) -> Self {
        Self { fixed }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.fixed
    }
}
