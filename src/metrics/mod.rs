//! Metrics derived from the event log.
//!
//! Every function here is a read-only fold over [`EventLog`] entries; no
//! simulation state is consulted, so metrics can be recomputed at any time
//! without replaying the run.
//!
//! # Definitions
//!
//! | Metric | Definition |
//! |--------|-----------|
//! | Segment | Paired `_START`/`_END` for one (order, activity, slot) |
//! | Lead time | Last segment end − 0 (simulation start) |
//! | Processing time | Sum of the order's segment durations |
//! | Waiting time | Lead time − processing time |
//! | Utilization | Segment time in a phase / (elapsed × slot count) |

mod kpi;

pub use kpi::{LineKpi, PhaseUtilization};

use std::collections::BTreeMap;

use serde::Serialize;

use crate::models::{EventKind, EventLog, OrderId, Phase};

/// One closed processing interval.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Segment {
    pub order_id: OrderId,
    pub phase: Phase,
    pub activity: String,
    pub slot: Option<usize>,
    pub start: f64,
    pub end: f64,
}

impl Segment {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Pairs start and end records into segments, in end order.
///
/// An `_END` without a matching `_START` is ignored; a `_START` still open
/// at the end of the log is work in progress and yields no segment.
pub fn segments(log: &EventLog) -> Vec<Segment> {
    let mut open: BTreeMap<(&str, &str, Option<usize>), f64> = BTreeMap::new();
    let mut closed = Vec::new();
    for entry in log.entries() {
        let key = (entry.order_id.as_str(), entry.activity.as_str(), entry.slot);
        match entry.kind {
            EventKind::Start => {
                open.insert(key, entry.time);
            }
            EventKind::End => {
                if let Some(start) = open.remove(&key) {
                    closed.push(Segment {
                        order_id: entry.order_id.clone(),
                        phase: entry.phase,
                        activity: entry.activity.clone(),
                        slot: entry.slot,
                        start,
                        end: entry.time,
                    });
                }
            }
        }
    }
    closed
}

/// Per-order times reconstructed from the log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderMetrics {
    pub order_id: OrderId,
    /// Whether the quality phase has ended for this order.
    pub completed: bool,
    /// End of the quality segment, for completed orders.
    pub completion_time: Option<f64>,
    pub first_start: f64,
    pub last_end: f64,
    pub lead_time: f64,
    pub processing_time: f64,
    pub waiting_time: f64,
    /// Number of closed segments.
    pub segments: usize,
}

/// Per-order metrics for every order with at least one closed segment.
pub fn order_metrics(log: &EventLog) -> BTreeMap<OrderId, OrderMetrics> {
    let mut metrics: BTreeMap<OrderId, OrderMetrics> = BTreeMap::new();
    for segment in segments(log) {
        let entry = metrics
            .entry(segment.order_id.clone())
            .or_insert_with(|| OrderMetrics {
                order_id: segment.order_id.clone(),
                completed: false,
                completion_time: None,
                first_start: segment.start,
                last_end: segment.end,
                lead_time: 0.0,
                processing_time: 0.0,
                waiting_time: 0.0,
                segments: 0,
            });
        entry.first_start = entry.first_start.min(segment.start);
        entry.last_end = entry.last_end.max(segment.end);
        entry.processing_time += segment.duration();
        entry.segments += 1;
        if segment.phase == Phase::Quality {
            entry.completed = true;
            entry.completion_time = Some(segment.end);
        }
    }
    for m in metrics.values_mut() {
        m.lead_time = m.last_end;
        m.waiting_time = m.lead_time - m.processing_time;
    }
    metrics
}

/// Terminal record of a completed order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TerminalRecord {
    pub order_id: OrderId,
    pub completion_time: f64,
    pub total_waiting_time: f64,
    pub total_processing_time: f64,
}

/// Terminal records of every completed order, in completion order.
pub fn terminal_records(log: &EventLog) -> Vec<TerminalRecord> {
    let mut records: Vec<TerminalRecord> = order_metrics(log)
        .into_values()
        .filter_map(|m| {
            Some(TerminalRecord {
                completion_time: m.completion_time?,
                total_waiting_time: m.waiting_time,
                total_processing_time: m.processing_time,
                order_id: m.order_id,
            })
        })
        .collect();
    records.sort_by(|a, b| {
        a.completion_time
            .total_cmp(&b.completion_time)
            .then_with(|| a.order_id.cmp(&b.order_id))
    });
    records
}

/// Busy time per phase: sum of closed segment durations.
pub fn busy_time_by_phase(log: &EventLog) -> BTreeMap<Phase, f64> {
    let mut busy = BTreeMap::new();
    for segment in segments(log) {
        *busy.entry(segment.phase).or_insert(0.0) += segment.duration();
    }
    busy
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_log() -> EventLog {
        let mut log = EventLog::new();
        log.start(2.0, "A", Phase::Acceptance, "ACCEPTANCE", None);
        log.end(5.0, "A", Phase::Acceptance, "ACCEPTANCE", None);
        log.start(7.0, "A", Phase::Disassembly, "DISASSEMBLY:engine", Some(0));
        log.start(7.0, "B", Phase::Disassembly, "DISASSEMBLY:engine", Some(1));
        log.end(10.0, "A", Phase::Disassembly, "DISASSEMBLY:engine", Some(0));
        log.start(12.0, "A", Phase::Quality, "QUALITY", None);
        log.end(14.0, "A", Phase::Quality, "QUALITY", None);
        log
    }

    #[test]
    fn test_segments_pair_by_order_activity_slot() {
        let segs = segments(&make_log());
        assert_eq!(segs.len(), 3);
        assert!(segs.iter().all(|s| s.order_id == "A"));
        assert_eq!(segs[1].slot, Some(0));
        assert!((segs[1].duration() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_unmatched_end_is_ignored() {
        let mut log = EventLog::new();
        log.end(3.0, "X", Phase::Inspection, "INSPECTION", None);
        assert!(segments(&log).is_empty());
    }

    #[test]
    fn test_processing_plus_waiting_is_lead() {
        let metrics = order_metrics(&make_log());
        let a = &metrics["A"];
        assert!(a.completed);
        assert_eq!(a.completion_time, Some(14.0));
        assert!((a.lead_time - 14.0).abs() < 1e-9);
        assert!((a.processing_time - 8.0).abs() < 1e-9);
        assert!((a.processing_time + a.waiting_time - a.lead_time).abs() < 1e-9);
        // B has only an open segment
        assert!(!metrics.contains_key("B"));
    }

    #[test]
    fn test_terminal_records_only_completed() {
        let mut log = make_log();
        log.start(0.0, "C", Phase::Acceptance, "ACCEPTANCE", None);
        log.end(1.0, "C", Phase::Acceptance, "ACCEPTANCE", None);
        let records = terminal_records(&log);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].order_id, "A");
        assert!((records[0].total_waiting_time - 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_busy_time_by_phase() {
        let busy = busy_time_by_phase(&make_log());
        assert!((busy[&Phase::Acceptance] - 3.0).abs() < 1e-9);
        assert!((busy[&Phase::Disassembly] - 3.0).abs() < 1e-9);
        assert!(!busy.contains_key(&Phase::Reassembly));
    }
}
