use std::collections::VecDeque;

use crate::types::LogLine;

/// Bounded narrative log. Oldest lines fall off once `capacity` is exceeded;
/// `total` keeps counting.
#[derive(Clone, Debug)]
pub struct EventLog {
    lines: VecDeque<LogLine>,
    capacity: usize,
    total: u64,
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity.min(512)),
            capacity: capacity.max(1),
            total: 0,
        }
    }

    pub fn add(&mut self, at: f32, text: impl Into<String>) {
        self.lines.push_back(LogLine {
            at,
            text: text.into(),
        });
        self.total += 1;
        while self.lines.len() > self.capacity {
            self.lines.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn iter(&self) -> impl Iterator<Item = &LogLine> {
        self.lines.iter()
    }

    /// Last `n` lines, oldest first.
    pub fn tail(&self, n: usize) -> Vec<LogLine> {
        let skip = self.lines.len().saturating_sub(n);
        self.lines.iter().skip(skip).cloned().collect()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines.iter().any(|line| line.text.contains(needle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_oldest_past_capacity() {
        let mut log = EventLog::new(3);
        for i in 0..5 {
            log.add(i as f32, format!("line {i}"));
        }
        assert_eq!(log.len(), 3);
        assert_eq!(log.total(), 5);
        let texts: Vec<String> = log.iter().map(|l| l.text.clone()).collect();
        assert_eq!(texts, vec!["line 2", "line 3", "line 4"]);
    }

    #[test]
    fn tail_returns_newest_in_order() {
        let mut log = EventLog::new(10);
        for i in 0..4 {
            log.add(0.0, format!("{i}"));
        }
        let tail: Vec<String> = log.tail(2).into_iter().map(|l| l.text).collect();
        assert_eq!(tail, vec!["2", "3"]);
        assert_eq!(log.tail(50).len(), 4);
        assert!(log.contains("3"));
    }
}
