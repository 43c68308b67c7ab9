//! Validation events reported while checking a document against a composed schema.
//!
//! libxml2 does not abort on schema nonconformance; it reports each problem
//! through a callback. Every read/write creates its own collector, hands it to
//! the validation call and inspects it afterwards.

use std::fmt;

/// Severity of a single validation event, as reported by libxml2
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Warning,
    Error,
    FatalError,
}

impl Severity {
    /// Map a libxml2 `xmlErrorLevel` value
    pub(crate) fn from_level(level: i32) -> Self {
        match level {
            1 => Severity::Warning,
            3 => Severity::FatalError,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => f.write_str("warning"),
            Severity::Error => f.write_str("error"),
            Severity::FatalError => f.write_str("fatal error"),
        }
    }
}

/// A single nonconformance diagnostic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationEvent {
    pub severity: Severity,
    pub message: String,
}

impl ValidationEvent {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
        }
    }
}

/// Collects validation events in the order they are encountered
#[derive(Debug, Default, Clone)]
pub struct ValidationEventCollector {
    events: Vec<ValidationEvent>,
}

impl ValidationEventCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle_event(&mut self, event: ValidationEvent) {
        self.events.push(event);
    }

    pub fn has_events(&self) -> bool {
        !self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> &[ValidationEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<ValidationEvent> {
        self.events
    }

    /// Drop events below `severity`
    pub fn retain_at_least(&mut self, severity: Severity) {
        self.events.retain(|event| event.severity >= severity);
    }

    /// All messages newline-joined in encounter order, trailing whitespace trimmed
    pub fn joined_messages(&self) -> String {
        let mut joined = String::new();
        for event in &self.events {
            joined.push_str(&event.message);
            joined.push('\n');
        }
        joined.trim_end().to_string()
    }
}
