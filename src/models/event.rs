//! Append-only event log.
//!
//! Every start and end of processing work is recorded as an
//! [`EventEntry`]. The log is the only input to the metrics folds, so lead,
//! processing and waiting times can be rebuilt at any point without
//! replaying the simulation.

use serde::{Deserialize, Serialize};

use super::{OrderId, Phase};

/// Start or end marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventKind {
    Start,
    End,
}

/// One log record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEntry {
    /// Simulated time (minutes).
    pub time: f64,
    pub order_id: OrderId,
    /// Phase the work belongs to.
    pub phase: Phase,
    /// Activity name, e.g. `INSPECTION` or `DISASSEMBLY:engine`.
    pub activity: String,
    /// Slot index for slot-backed work.
    pub slot: Option<usize>,
    pub kind: EventKind,
}

impl EventEntry {
    /// Record label in `<ACTIVITY>_START` / `<ACTIVITY>_END` form.
    pub fn label(&self) -> String {
        match self.kind {
            EventKind::Start => format!("{}_START", self.activity),
            EventKind::End => format!("{}_END", self.activity),
        }
    }
}

/// Append-only sequence of [`EventEntry`] records.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventLog {
    entries: Vec<EventEntry>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a record.
    pub fn append(&mut self, entry: EventEntry) {
        self.entries.push(entry);
    }

    /// Appends a start record.
    pub fn start(
        &mut self,
        time: f64,
        order_id: &str,
        phase: Phase,
        activity: impl Into<String>,
        slot: Option<usize>,
    ) {
        self.append(EventEntry {
            time,
            order_id: order_id.to_string(),
            phase,
            activity: activity.into(),
            slot,
            kind: EventKind::Start,
        });
    }

    /// Appends an end record.
    pub fn end(
        &mut self,
        time: f64,
        order_id: &str,
        phase: Phase,
        activity: impl Into<String>,
        slot: Option<usize>,
    ) {
        self.append(EventEntry {
            time,
            order_id: order_id.to_string(),
            phase,
            activity: activity.into(),
            slot,
            kind: EventKind::End,
        });
    }

    pub fn entries(&self) -> &[EventEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Records appended at or after position `cursor`. Consumers keep the
    /// returned length as their next cursor.
    pub fn since(&self, cursor: usize) -> &[EventEntry] {
        self.entries.get(cursor..).unwrap_or(&[])
    }

    /// Records of one order, in log order.
    pub fn for_order<'a>(&'a self, order_id: &'a str) -> impl Iterator<Item = &'a EventEntry> {
        self.entries.iter().filter(move |e| e.order_id == order_id)
    }

    /// Exports the log as a JSON array.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_log() -> EventLog {
        let mut log = EventLog::new();
        log.start(0.0, "O1", Phase::Acceptance, "ACCEPTANCE", None);
        log.end(10.0, "O1", Phase::Acceptance, "ACCEPTANCE", None);
        log.start(10.0, "O2", Phase::Disassembly, "DISASSEMBLY:engine", Some(1));
        log
    }

    #[test]
    fn test_labels() {
        let log = sample_log();
        assert_eq!(log.entries()[0].label(), "ACCEPTANCE_START");
        assert_eq!(log.entries()[1].label(), "ACCEPTANCE_END");
    }

    #[test]
    fn test_since_cursor() {
        let log = sample_log();
        assert_eq!(log.since(0).len(), 3);
        assert_eq!(log.since(2).len(), 1);
        assert!(log.since(3).is_empty());
        assert!(log.since(99).is_empty());
    }

    #[test]
    fn test_for_order() {
        let log = sample_log();
        assert_eq!(log.for_order("O1").count(), 2);
        assert_eq!(log.for_order("O2").next().unwrap().slot, Some(1));
    }

    #[test]
    fn test_json_export() {
        let log = sample_log();
        let json = log.to_json().unwrap();
        let back: Vec<EventEntry> = serde_json::from_str(&json).unwrap();
        assert_eq!(back.len(), 3);
        assert!(json.contains("\"START\""));
        assert!(json.contains("\"disassembly\""));
    }
}
