//! Append-only chat history
//!
//! Every broadcast chat line, in broadcast order. Replayed to each new client.

/// Ordered log of formatted chat lines
#[derive(Debug, Default)]
pub struct History {
    lines: Vec<String>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, line: String) {
        self.lines.push(line);
    }

    /// All lines in append order
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_starts_empty() {
        let history = History::new();
        assert!(history.is_empty());
        assert!(history.lines().is_empty());
    }

    #[test]
    fn test_append_keeps_order() {
        let mut history = History::new();
        history.append("one".to_string());
        history.append("two".to_string());
        history.append("one".to_string());

        assert_eq!(history.len(), 3);
        assert_eq!(history.lines(), ["one", "two", "one"]);
    }
}
