//! Bounded per-session log of question/answer exchanges.

use serde::Serialize;
use std::collections::VecDeque;

/// One answered question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Exchange {
    /// Question as asked.
    pub question: String,
    /// Generated answer.
    pub answer: String,
    /// RFC 3339 timestamp of when the answer was produced.
    pub answered_at: String,
}

/// Ordered exchanges, oldest first, evicting the oldest entry once `capacity` is reached.
#[derive(Debug, Clone)]
pub struct ExchangeLog {
    entries: VecDeque<Exchange>,
    capacity: usize,
}

impl ExchangeLog {
    /// Create an empty log holding at most `capacity` exchanges.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(64)),
            capacity,
        }
    }

    /// Append an exchange, evicting from the front when full.
    pub fn push(&mut self, exchange: Exchange) {
        if self.capacity == 0 {
            return;
        }
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(exchange);
    }

    /// Number of retained exchanges.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no exchange is retained.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copy of the retained exchanges, oldest first.
    pub fn to_vec(&self) -> Vec<Exchange> {
        self.entries.iter().cloned().collect()
    }
}
