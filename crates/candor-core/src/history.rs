//! Bounded per-session conversation history.

use std::collections::VecDeque;

/// One completed query/answer exchange.
#[derive(Debug, Clone)]
pub struct ConversationTurn {
    pub query: String,
    pub answer: String,
    pub judge_score: Option<u8>,
}

/// Session state carried across queries.
///
/// Holds the last `max_turns` completed exchanges; the oldest turn is
/// evicted when a new one would exceed the bound. A turn is recorded only
/// after a query finishes end to end, so a failed pipeline run leaves the
/// history untouched.
#[derive(Debug, Clone)]
pub struct Session {
    turns: VecDeque<ConversationTurn>,
    max_turns: usize,
}

impl Session {
    #[must_use]
    pub fn new(max_turns: usize) -> Self {
        Self {
            turns: VecDeque::with_capacity(max_turns),
            max_turns,
        }
    }

    /// Record a completed exchange, evicting the oldest if at capacity.
    ///
    /// A zero-capacity session keeps nothing.
    pub fn record(&mut self, turn: ConversationTurn) {
        if self.max_turns == 0 {
            return;
        }
        while self.turns.len() >= self.max_turns {
            self.turns.pop_front();
        }
        self.turns.push_back(turn);
    }

    /// Turns in chronological order, oldest first.
    #[must_use]
    pub fn turns(&self) -> impl Iterator<Item = &ConversationTurn> {
        self.turns.iter()
    }

    /// The most recent `n` turns, still in chronological order.
    #[must_use]
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &ConversationTurn> {
        let skip = self.turns.len().saturating_sub(n);
        self.turns.iter().skip(skip)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(n: usize) -> ConversationTurn {
        ConversationTurn {
            query: format!("q{n}"),
            answer: format!("a{n}"),
            judge_score: Some(4),
        }
    }

    #[test]
    fn records_in_order() {
        let mut session = Session::new(5);
        session.record(turn(1));
        session.record(turn(2));
        let queries: Vec<_> = session.turns().map(|t| t.query.clone()).collect();
        assert_eq!(queries, ["q1", "q2"]);
    }

    #[test]
    fn evicts_oldest_at_capacity() {
        let mut session = Session::new(3);
        for n in 1..=5 {
            session.record(turn(n));
        }
        assert_eq!(session.len(), 3);
        let queries: Vec<_> = session.turns().map(|t| t.query.clone()).collect();
        assert_eq!(queries, ["q3", "q4", "q5"]);
    }

    #[test]
    fn zero_capacity_keeps_nothing() {
        let mut session = Session::new(0);
        session.record(turn(1));
        session.record(turn(2));
        assert!(session.is_empty());
        assert_eq!(session.len(), 0);
    }

    #[test]
    fn recent_keeps_chronological_order() {
        let mut session = Session::new(5);
        for n in 1..=4 {
            session.record(turn(n));
        }
        let queries: Vec<_> = session.recent(2).map(|t| t.query.clone()).collect();
        assert_eq!(queries, ["q3", "q4"]);
    }

    #[test]
    fn recent_larger_than_len_returns_all() {
        let mut session = Session::new(5);
        session.record(turn(1));
        assert_eq!(session.recent(10).count(), 1);
    }
}
