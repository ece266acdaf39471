//! Core type definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Side of a price event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Buy,
    Sell,
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Buy => "buy",
            EventKind::Sell => "sell",
        }
    }

    pub fn all() -> [EventKind; 2] {
        [EventKind::Buy, EventKind::Sell]
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A single decoded price event.
///
/// Producers written against the first version of the wire format send
/// `company` / `eventType`; both spellings are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(alias = "company")]
    pub subject: String,
    #[serde(alias = "eventType")]
    pub kind: EventKind,
    pub price: f64,
}

impl Event {
    pub fn new(subject: impl Into<String>, kind: EventKind, price: f64) -> Self {
        Self {
            subject: subject.into(),
            kind,
            price,
        }
    }
}

/// An ordered, non-empty group of events handed to one worker
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    sequence: u64,
    events: Vec<Event>,
}

impl Batch {
    /// Returns `None` for an empty event list.
    pub fn new(sequence: u64, events: Vec<Event>) -> Option<Self> {
        if events.is_empty() {
            return None;
        }
        Some(Self { sequence, events })
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    // Always false for a constructed batch.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn prices(&self) -> impl Iterator<Item = f64> + '_ {
        self.events.iter().map(|e| e.price)
    }

    pub fn into_events(self) -> Vec<Event> {
        self.events
    }
}

/// Aggregate computed from exactly one batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateRecord {
    pub subject: String,
    pub average_price: f64,
    pub computed_at: DateTime<Utc>,
    pub batch_size: usize,
}

impl AggregateRecord {
    pub fn new(subject: impl Into<String>, average_price: f64, batch_size: usize) -> Self {
        Self {
            subject: subject.into(),
            average_price,
            computed_at: Utc::now(),
            batch_size,
        }
    }
}
