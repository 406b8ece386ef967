//! The scheduled deadline sweep.
//!
//! Walks every semester configuration, applies the two calendar actions to
//! the rows whose deadline has passed and whose applied timestamp is still
//! unset, and isolates failures per row: one department's bad data must not
//! abort the sweep for the others.

use tracing::{error, info};

use crate::calendar::{self, SemesterKey};
use crate::error::CoreError;
use crate::event::{Actor, DomainEvent, EventKind};
use crate::lifecycle::Lifecycle;
use crate::RequestId;

/// Outcome of one semester row.
#[derive(Debug, Clone)]
pub struct SweepRow {
    pub key: SemesterKey,
    /// Pending requests auto-rejected past the submission deadline.
    pub rejected: usize,
    /// Active requests whose topic editing was locked.
    pub locked: usize,
    pub error: Option<String>,
}

impl SweepRow {
    /// Both actions may fail independently for the same row; a later
    /// failure is appended, never overwriting an earlier one.
    fn record_error(&mut self, cause: &CoreError) {
        let cause = cause.to_string();
        self.error = Some(match self.error.take() {
            Some(previous) => format!("{previous}; {cause}"),
            None => cause,
        });
    }
}

/// Per-row outcomes of a whole sweep.
#[derive(Debug, Clone, Default)]
pub struct SweepReport {
    pub rows: Vec<SweepRow>,
}

impl SweepReport {
    #[must_use]
    pub fn total_rejected(&self) -> usize {
        self.rows.iter().map(|row| row.rejected).sum()
    }

    #[must_use]
    pub fn total_locked(&self) -> usize {
        self.rows.iter().map(|row| row.locked).sum()
    }

    pub fn failures(&self) -> impl Iterator<Item = &SweepRow> {
        self.rows.iter().filter(|row| row.error.is_some())
    }
}

impl Lifecycle {
    /// Runs the deadline sweep once. Intended to be scheduled at least
    /// daily; both actions are idempotent, so rerunning is harmless.
    pub fn run_deadline_sweep(&self) -> SweepReport {
        let now = self.clock().now();
        let keys: Vec<SemesterKey> = self
            .store()
            .read(|state| state.semesters.keys().cloned().collect());
        info!(semesters = keys.len(), "deadline sweep started");

        let mut report = SweepReport::default();
        for key in keys {
            let mut row = SweepRow {
                key: key.clone(),
                rejected: 0,
                locked: 0,
                error: None,
            };

            // Each action is its own unit of work: the bulk update and its
            // applied timestamp commit together, so a crash in between
            // leaves the row reprocessable.
            match self
                .store()
                .transaction(|state| calendar::apply_student_request_cancellation(state, &key, now))
            {
                Ok(rejected) => {
                    row.rejected = rejected.len();
                    self.emit_auto_rejections(&rejected, now);
                }
                Err(cause) => {
                    error!(semester = %key, %cause, "student request lock failed");
                    row.record_error(&cause);
                }
            }

            match self
                .store()
                .transaction(|state| calendar::apply_teacher_editing_lock(state, &key, now))
            {
                Ok(locked) => row.locked = locked.len(),
                Err(cause) => {
                    error!(semester = %key, %cause, "teacher editing lock failed");
                    row.record_error(&cause);
                }
            }

            if row.rejected > 0 || row.locked > 0 {
                info!(
                    semester = %row.key,
                    rejected = row.rejected,
                    locked = row.locked,
                    "deadline sweep applied"
                );
            }
            report.rows.push(row);
        }

        info!(
            rejected = report.total_rejected(),
            locked = report.total_locked(),
            failures = report.failures().count(),
            "deadline sweep finished"
        );
        report
    }

    fn emit_auto_rejections(&self, rejected: &[RequestId], now: chrono::DateTime<chrono::Utc>) {
        for id in rejected {
            let student = self
                .store()
                .read(|state| state.requests.get(id).map(|request| request.student));
            if let Some(student) = student {
                self.sink().emit(DomainEvent {
                    kind: EventKind::RequestRejected,
                    request: *id,
                    actor: Actor::System,
                    counterpart: Actor::Student(student),
                    at: now,
                    template: "request_auto_rejected",
                });
            }
        }
    }
}
