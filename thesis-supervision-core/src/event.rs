//! Domain events handed to the notification collaborator.
//!
//! Lifecycle operations collect events inside the transaction and emit them
//! only after the commit, so a slow or failing delivery channel can never
//! stall or fail a state transition.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::{RequestId, StudentId, TeacherId};

/// Who triggered or is addressed by an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Actor {
    Student(StudentId),
    Teacher(TeacherId),
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    RequestCreated,
    RequestApproved,
    RequestRejected,
    RequestCompleted,
    CommentAdded,
}

/// One notification-worthy fact. The `template` key picks the message
/// wording; rendering and delivery are the collaborator's business.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DomainEvent {
    pub kind: EventKind,
    pub request: RequestId,
    pub actor: Actor,
    pub counterpart: Actor,
    pub at: DateTime<Utc>,
    pub template: &'static str,
}

/// Post-commit consumer of domain events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: DomainEvent);
}

/// Drops every event. Useful for batch tools and tests that do not care.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: DomainEvent) {}
}

/// Forwards events into a tokio channel for an async dispatcher to drain.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<DomainEvent>,
}

impl ChannelSink {
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<DomainEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl EventSink for ChannelSink {
    // The receiver being gone means no dispatcher is listening; state
    // transitions must not fail because of that.
    fn emit(&self, event: DomainEvent) {
        let _ = self.sender.send(event);
    }
}
