//! Local, optimistic picture of one conversation.
//!
//! Messages the session has just persisted are shown right away as hints.
//! The next authoritative query supersedes them: a hint the store already
//! returns is dropped, a hint the store does not return yet is kept. Entries
//! are keyed by id, so nothing is listed twice and nothing disappears.

use std::collections::HashSet;

use uuid::Uuid;

use crate::message::Message;

#[derive(Debug, Clone, Default)]
pub struct ConversationView {
    confirmed: Vec<Message>,
    pending: Vec<Message>,
}

impl ConversationView {
    pub fn new() -> Self {
        Self::default()
    }

    fn contains(&self, id: Uuid) -> bool {
        self.confirmed.iter().chain(&self.pending).any(|m| m.id == id)
    }

    /// Shows a just-persisted message before the store is re-queried
    pub fn apply_local(&mut self, message: Message) {
        if !self.contains(message.id) {
            self.pending.push(message);
        }
    }

    /// Replaces the confirmed history with an authoritative query result
    pub fn reconcile(&mut self, authoritative: Vec<Message>) {
        let mut seen = HashSet::with_capacity(authoritative.len());
        self.confirmed = authoritative
            .into_iter()
            .filter(|m| seen.insert(m.id))
            .collect();
        self.confirmed.sort_by_key(|m| m.created_at);
        self.pending.retain(|m| !seen.contains(&m.id));
    }

    /// Hints not yet seen in an authoritative result
    pub fn pending(&self) -> &[Message] {
        &self.pending
    }

    /// Confirmed and pending messages, oldest first
    pub fn messages(&self) -> Vec<Message> {
        let mut all: Vec<Message> = self
            .confirmed
            .iter()
            .chain(&self.pending)
            .cloned()
            .collect();
        all.sort_by_key(|m| m.created_at);
        all
    }

    pub fn len(&self) -> usize {
        self.confirmed.len() + self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
