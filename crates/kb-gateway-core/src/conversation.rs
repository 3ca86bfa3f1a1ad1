//! Client-side conversation state.
//!
//! A [`Conversation`] is advanced only through [`Conversation::apply`] with
//! an [`Action`]. It threads the session id from one answer into the next
//! question and guarantees at most one question in flight.
//!
//! ```text
//!   Submit ──▶ Pending ──Answered──▶ Answered
//!                 │
//!                 ├────Errored────▶ Errored (gateway error text)
//!                 └────Failed─────▶ Errored (client error text)
//! ```
//!
//! Each submitted question gets a [`Ticket`]. Replies for a ticket that is
//! no longer pending (the chat was reset meanwhile) are dropped.

use serde::{Deserialize, Serialize};

/// Answer text shown when the gateway cannot be reached.
pub const CLIENT_ERROR_MESSAGE: &str = "Error generating an answer. Please check the gateway \
logs, the IP allow-list, and model access for the knowledge base.";

/// Number of history entries a client displays.
pub const VISIBLE_HISTORY: usize = 15;

/// Identifies one submitted question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Pending,
    Answered,
    Errored,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub ticket: Ticket,
    pub question: String,
    pub answer: Option<String>,
    pub citation: Option<String>,
    pub state: EntryState,
}

/// Gateway reply to a question, the `POST /docs` response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryReply {
    pub response: String,
    pub citation: Option<String>,
    pub session_id: Option<String>,
}

/// A question ready to be sent, carrying the conversation's context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingQuestion {
    pub ticket: Ticket,
    pub question: String,
    pub session_id: Option<String>,
    pub model_id: Option<String>,
}

#[derive(Debug, Clone)]
pub enum Action {
    Submit(String),
    Answered { ticket: Ticket, reply: QueryReply },
    /// The gateway answered with its error reply.
    Errored { ticket: Ticket, reply: QueryReply },
    /// The gateway could not be reached or answered garbage.
    Failed { ticket: Ticket },
    NewChat,
    SelectModel(Option<String>),
}

/// Result of applying an [`Action`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A question was accepted and must now be sent.
    Send(PendingQuestion),
    /// State changed; nothing to send.
    Updated,
    /// The action had no effect (busy, blank question, or stale ticket).
    Ignored,
}

#[derive(Debug, Clone, Default)]
pub struct Conversation {
    history: Vec<HistoryEntry>,
    session_id: Option<String>,
    model_id: Option<String>,
    next_ticket: u64,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    /// The last `n` history entries, oldest first.
    pub fn recent(&self, n: usize) -> &[HistoryEntry] {
        let start = self.history.len().saturating_sub(n);
        &self.history[start..]
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn model_id(&self) -> Option<&str> {
        self.model_id.as_deref()
    }

    /// True while a question awaits its reply; input is disabled meanwhile.
    pub fn is_busy(&self) -> bool {
        self.history.iter().any(|e| e.state == EntryState::Pending)
    }

    pub fn apply(&mut self, action: Action) -> Outcome {
        match action {
            Action::Submit(question) => self.submit(question),
            Action::Answered { ticket, reply } => {
                let Some(entry) = self.pending_entry(ticket) else {
                    return Outcome::Ignored;
                };
                entry.answer = Some(reply.response);
                entry.citation = reply.citation;
                entry.state = EntryState::Answered;
                self.session_id = reply.session_id;
                Outcome::Updated
            }
            Action::Errored { ticket, reply } => {
                let Some(entry) = self.pending_entry(ticket) else {
                    return Outcome::Ignored;
                };
                entry.answer = Some(reply.response);
                entry.citation = None;
                entry.state = EntryState::Errored;
                self.session_id = reply.session_id;
                Outcome::Updated
            }
            Action::Failed { ticket } => {
                let Some(entry) = self.pending_entry(ticket) else {
                    return Outcome::Ignored;
                };
                entry.answer = Some(CLIENT_ERROR_MESSAGE.to_string());
                entry.citation = None;
                entry.state = EntryState::Errored;
                Outcome::Updated
            }
            Action::NewChat => {
                self.history.clear();
                self.session_id = None;
                Outcome::Updated
            }
            Action::SelectModel(model_id) => {
                self.model_id = model_id;
                self.session_id = None;
                Outcome::Updated
            }
        }
    }

    fn submit(&mut self, question: String) -> Outcome {
        let question = question.trim();
        if question.is_empty() || self.is_busy() {
            return Outcome::Ignored;
        }

        let ticket = Ticket(self.next_ticket);
        self.next_ticket += 1;
        self.history.push(HistoryEntry {
            ticket,
            question: question.to_string(),
            answer: None,
            citation: None,
            state: EntryState::Pending,
        });

        Outcome::Send(PendingQuestion {
            ticket,
            question: question.to_string(),
            session_id: self.session_id.clone(),
            model_id: self.model_id.clone(),
        })
    }

    fn pending_entry(&mut self, ticket: Ticket) -> Option<&mut HistoryEntry> {
        self.history
            .iter_mut()
            .find(|e| e.ticket == ticket && e.state == EntryState::Pending)
    }
}
