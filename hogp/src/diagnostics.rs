//! Event & diagnostics tap: bounded in-memory history plus hot broadcast
//! streams.
//!
//! Nothing here may block the notification engine. Broadcast uses
//! immediate (drop-oldest) publishers, so a slow subscriber loses old
//! messages instead of stalling the send path. History rings drop their
//! oldest entry on overflow.

use embassy_time::{Duration, Instant};
use embassy_sync::pubsub::{PubSubChannel, Subscriber};
use heapless::{Deque, Vec};

use crate::config::LogLevel;
use crate::event::{
    ConnectionEvent, ConnectionRecord, DiagnosticEvent, LogEntry, MetricSample, ReportRecord,
};
use crate::{
    RawMutex, CONNECTION_HISTORY_DEPTH, DIAG_STREAM_CAP, DIAG_STREAM_PUBS, DIAG_STREAM_SUBS,
    LOG_HISTORY_DEPTH, OP_SUMMARY_SLOTS, REPORT_HISTORY_DEPTH,
};

pub type ReportStream<'a> =
    Subscriber<'a, RawMutex, ReportRecord, DIAG_STREAM_CAP, DIAG_STREAM_SUBS, DIAG_STREAM_PUBS>;
pub type ConnectionStream<'a> =
    Subscriber<'a, RawMutex, ConnectionRecord, DIAG_STREAM_CAP, DIAG_STREAM_SUBS, DIAG_STREAM_PUBS>;
pub type EventStream<'a> =
    Subscriber<'a, RawMutex, DiagnosticEvent, DIAG_STREAM_CAP, DIAG_STREAM_SUBS, DIAG_STREAM_PUBS>;

/// The broadcast side of the tap. Lives outside the engine's interior
/// mutability so subscribers can be held across intent calls.
pub struct DiagStreams {
    reports: PubSubChannel<RawMutex, ReportRecord, DIAG_STREAM_CAP, DIAG_STREAM_SUBS, DIAG_STREAM_PUBS>,
    connections:
        PubSubChannel<RawMutex, ConnectionRecord, DIAG_STREAM_CAP, DIAG_STREAM_SUBS, DIAG_STREAM_PUBS>,
    events: PubSubChannel<RawMutex, DiagnosticEvent, DIAG_STREAM_CAP, DIAG_STREAM_SUBS, DIAG_STREAM_PUBS>,
}

impl DiagStreams {
    pub(crate) const fn new() -> Self {
        Self {
            reports: PubSubChannel::new(),
            connections: PubSubChannel::new(),
            events: PubSubChannel::new(),
        }
    }

    /// Hot stream of every report the tap observes. `None` when all
    /// subscriber slots are taken.
    pub fn report_stream(&self) -> Option<ReportStream<'_>> {
        self.reports.subscriber().ok()
    }

    /// Hot stream of link/pairing/service events.
    pub fn connection_stream(&self) -> Option<ConnectionStream<'_>> {
        self.connections.subscriber().ok()
    }

    /// Hot stream of every tagged diagnostic event.
    pub fn event_stream(&self) -> Option<EventStream<'_>> {
        self.events.subscriber().ok()
    }

    pub(crate) fn publish_report(&self, record: ReportRecord) {
        self.reports.immediate_publisher().publish_immediate(record.clone());
        self.events
            .immediate_publisher()
            .publish_immediate(DiagnosticEvent::Report(record));
    }

    pub(crate) fn publish_connection(&self, record: ConnectionRecord) {
        self.connections.immediate_publisher().publish_immediate(record);
        self.events
            .immediate_publisher()
            .publish_immediate(DiagnosticEvent::Connection(record));
    }

    pub(crate) fn publish_event(&self, event: DiagnosticEvent) {
        self.events.immediate_publisher().publish_immediate(event);
    }
}

/// Duration summary of a named operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OpSummary {
    pub name: &'static str,
    pub count: u32,
    pub succeeded: u32,
    pub total: Duration,
}

impl OpSummary {
    /// Average duration over all completions.
    pub fn average(&self) -> Duration {
        if self.count == 0 {
            Duration::from_ticks(0)
        } else {
            Duration::from_ticks(self.total.as_ticks() / self.count as u64)
        }
    }

    /// Fraction of completions that succeeded, in percent.
    pub fn success_rate(&self) -> u32 {
        if self.count == 0 {
            100
        } else {
            self.succeeded * 100 / self.count
        }
    }
}

/// Token returned by [`DiagnosticsTap::start_op`].
#[derive(Debug, Clone, Copy)]
pub struct OpToken {
    name: &'static str,
    started: Instant,
}

/// Bounded in-memory history of reports, connection events and log
/// entries, plus operation metrics.
pub struct DiagnosticsTap {
    level: LogLevel,
    logs: Deque<LogEntry, LOG_HISTORY_DEPTH>,
    reports: Deque<ReportRecord, REPORT_HISTORY_DEPTH>,
    connections: Deque<ConnectionRecord, CONNECTION_HISTORY_DEPTH>,
    ops: Vec<OpSummary, OP_SUMMARY_SLOTS>,
}

impl DiagnosticsTap {
    pub(crate) fn new(level: LogLevel) -> Self {
        Self {
            level,
            logs: Deque::new(),
            reports: Deque::new(),
            connections: Deque::new(),
            ops: Vec::new(),
        }
    }

    /// Record a log line if it passes the severity filter.
    pub fn log(&mut self, streams: &DiagStreams, level: LogLevel, message: &'static str) {
        if level > self.level {
            return;
        }
        let entry = LogEntry {
            level,
            message,
            timestamp: Instant::now(),
        };
        if self.logs.is_full() {
            self.logs.pop_front();
        }
        let _ = self.logs.push_back(entry);
        streams.publish_event(DiagnosticEvent::Log(entry));
    }

    /// Record a sent/received report and broadcast it.
    pub fn record_report(&mut self, streams: &DiagStreams, record: ReportRecord) {
        if self.reports.is_full() {
            self.reports.pop_front();
        }
        let _ = self.reports.push_back(record.clone());
        streams.publish_report(record);
    }

    /// Record a connection/pairing/service event and broadcast it.
    pub fn record_connection(&mut self, streams: &DiagStreams, event: ConnectionEvent) {
        let record = ConnectionRecord::new(event);
        if self.connections.is_full() {
            self.connections.pop_front();
        }
        let _ = self.connections.push_back(record);
        streams.publish_connection(record);
    }

    /// Broadcast a named measurement.
    pub fn metric_record(&self, streams: &DiagStreams, name: &'static str, value: i64, unit: &'static str) {
        streams.publish_event(DiagnosticEvent::Metric(MetricSample {
            name,
            value,
            unit,
            timestamp: Instant::now(),
        }));
    }

    /// Begin timing a named operation.
    pub fn start_op(&self, name: &'static str) -> OpToken {
        OpToken {
            name,
            started: Instant::now(),
        }
    }

    /// Finish a timed operation and fold it into the summary.
    pub fn end_op(&mut self, streams: &DiagStreams, token: OpToken, success: bool) {
        let elapsed = token.started.elapsed();
        let summary = match self.ops.iter_mut().find(|s| s.name == token.name) {
            Some(summary) => summary,
            None => {
                if self
                    .ops
                    .push(OpSummary {
                        name: token.name,
                        count: 0,
                        succeeded: 0,
                        total: Duration::from_ticks(0),
                    })
                    .is_err()
                {
                    return;
                }
                self.ops.last_mut().unwrap()
            }
        };
        summary.count += 1;
        if success {
            summary.succeeded += 1;
        }
        summary.total = summary.total + elapsed;
        streams.publish_event(DiagnosticEvent::Metric(MetricSample {
            name: token.name,
            value: elapsed.as_micros() as i64,
            unit: "us",
            timestamp: Instant::now(),
        }));
    }

    /// Summary of a named operation, if any completions were recorded.
    pub fn op_summary(&self, name: &'static str) -> Option<OpSummary> {
        self.ops.iter().find(|s| s.name == name).copied()
    }

    /// Oldest-first iterator over the retained report history.
    pub fn report_history(&self) -> impl Iterator<Item = &ReportRecord> {
        self.reports.iter()
    }

    /// Oldest-first iterator over the retained connection history.
    pub fn connection_history(&self) -> impl Iterator<Item = &ConnectionRecord> {
        self.connections.iter()
    }

    /// Oldest-first iterator over the retained log entries.
    pub fn log_history(&self) -> impl Iterator<Item = &LogEntry> {
        self.logs.iter()
    }
}
