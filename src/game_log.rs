//! Append-only log of human-readable game events.

/// One line of the game log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// Position in arrival order. Never reused, even across resets.
    pub seq: u64,
    pub text: String,
}

/// Ordered record of what happened during the current game.
///
/// Entries are never edited or reordered. The log is cleared only when a new
/// game starts, and sequence numbers keep counting up across that reset.
#[derive(Debug, Clone, Default)]
pub struct GameLog {
    entries: Vec<LogEntry>,
    next_seq: u64,
}

impl GameLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a line and returns its sequence number.
    pub fn append(&mut self, text: impl Into<String>) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.push(LogEntry {
            seq,
            text: text.into(),
        });
        seq
    }

    /// Drops every entry. Only a new game may do this.
    pub(crate) fn reset(&mut self) {
        self.entries.clear();
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&LogEntry> {
        self.entries.last()
    }

    /// Iterates over the entry texts in order.
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.text.as_str())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn append_preserves_order_and_numbers_monotonically() {
        let mut log = GameLog::new();
        assert_eq!(log.append("first"), 0);
        assert_eq!(log.append("second"), 1);
        assert_eq!(log.texts().collect::<Vec<_>>(), ["first", "second"]);
        assert_eq!(log.last().unwrap().seq, 1);
    }

    #[test]
    fn sequence_keeps_counting_after_reset() {
        let mut log = GameLog::new();
        log.append("old game");
        log.append("old game again");
        log.reset();
        assert!(log.is_empty());
        assert_eq!(log.append("new game"), 2);
        assert_eq!(log.entries()[0].seq, 2);
    }
}
