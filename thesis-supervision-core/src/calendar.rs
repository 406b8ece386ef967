//! Semester calendar: per-department deadline configuration and the two
//! idempotent deadline actions the sweeper applies.

use core::fmt;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::request::RequestStatus;
use crate::store::State;
use crate::{Department, RequestId};

/// Rejection reason stamped on requests auto-rejected by the deadline sweep.
pub const AUTO_REJECT_REASON: &str = "auto-rejected after submission deadline";

static ACADEMIC_YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})/(\d{2})$").expect("academic year grammar"));

/// Academic year in `YYYY/YY` form, e.g. `2025/26`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AcademicYear {
    start: i32,
}

impl AcademicYear {
    pub const fn starting(start: i32) -> Self {
        Self { start }
    }

    pub fn parse(value: &str) -> Result<Self, CoreError> {
        let captures = ACADEMIC_YEAR
            .captures(value)
            .ok_or_else(|| CoreError::InvalidAcademicYear {
                value: value.to_owned(),
            })?;
        let start: i32 = captures[1].parse().map_err(|_| CoreError::InvalidAcademicYear {
            value: value.to_owned(),
        })?;
        let suffix: i32 = captures[2].parse().map_err(|_| CoreError::InvalidAcademicYear {
            value: value.to_owned(),
        })?;
        if (start + 1).rem_euclid(100) != suffix {
            return Err(CoreError::InvalidAcademicYear {
                value: value.to_owned(),
            });
        }
        Ok(Self { start })
    }

    /// The academic year a date falls into: September through August map to
    /// the year starting in the most recent September.
    pub fn from_date(date: NaiveDate) -> Self {
        let year = date.year();
        if date.month() >= 9 {
            Self { start: year }
        } else {
            Self { start: year - 1 }
        }
    }

    pub const fn start_year(&self) -> i32 {
        self.start
    }
}

impl fmt::Display for AcademicYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{:02}", self.start, (self.start + 1).rem_euclid(100))
    }
}

impl TryFrom<String> for AcademicYear {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<AcademicYear> for String {
    fn from(value: AcademicYear) -> Self {
        value.to_string()
    }
}

/// First semester runs September through February, second March through
/// August.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SemesterNumber {
    First,
    Second,
}

impl SemesterNumber {
    pub const fn from_month(month: u32) -> Self {
        match month {
            9..=12 | 1 | 2 => Self::First,
            _ => Self::Second,
        }
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self::from_month(date.month())
    }
}

/// Unique key of a semester configuration.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SemesterKey {
    pub department: Department,
    pub academic_year: AcademicYear,
    pub semester: SemesterNumber,
}

impl fmt::Display for SemesterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} sem. {}",
            self.department,
            self.academic_year,
            match self.semester {
                SemesterNumber::First => 1,
                SemesterNumber::Second => 2,
            }
        )
    }
}

/// Deadline configuration for one (department, academic year, semester).
///
/// The two `*_locked_at` timestamps make the irreversible sweep actions
/// idempotent: null until the sweep applies them, non-null thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemesterConfig {
    pub key: SemesterKey,
    pub lock_student_requests_date: Option<NaiveDate>,
    pub lock_teacher_editing_themes_date: Option<NaiveDate>,
    pub lock_cancel_requests_date: Option<NaiveDate>,
    pub allow_complete_work_date: Option<NaiveDate>,
    pub student_requests_locked_at: Option<DateTime<Utc>>,
    pub teacher_editing_locked_at: Option<DateTime<Utc>>,
}

impl SemesterConfig {
    pub fn new(key: SemesterKey) -> Self {
        Self {
            key,
            lock_student_requests_date: None,
            lock_teacher_editing_themes_date: None,
            lock_cancel_requests_date: None,
            allow_complete_work_date: None,
            student_requests_locked_at: None,
            teacher_editing_locked_at: None,
        }
    }

    /// The completion window must open no earlier than the latest lock.
    pub fn validate(&self) -> Result<(), CoreError> {
        if let Some(complete) = self.allow_complete_work_date {
            let latest_lock = [
                self.lock_student_requests_date,
                self.lock_teacher_editing_themes_date,
                self.lock_cancel_requests_date,
            ]
            .into_iter()
            .flatten()
            .max();
            if let Some(lock) = latest_lock {
                if complete < lock {
                    return Err(CoreError::InvalidSemesterConfig {
                        reason: format!(
                            "allow_complete_work_date {complete} is before the latest lock date {lock}"
                        ),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn can_create_request(&self, today: NaiveDate) -> bool {
        self.lock_student_requests_date
            .is_none_or(|deadline| today < deadline)
    }

    pub fn must_lock_topic_editing(&self, today: NaiveDate) -> bool {
        self.lock_teacher_editing_themes_date
            .is_some_and(|deadline| today >= deadline)
    }

    pub fn must_lock_cancellations(&self, today: NaiveDate) -> bool {
        self.lock_cancel_requests_date
            .is_some_and(|deadline| today >= deadline)
    }

    pub fn can_complete(&self, today: NaiveDate) -> bool {
        self.allow_complete_work_date
            .is_some_and(|date| today >= date)
    }
}

fn in_scope(state: &State, request: &crate::request::Request, key: &SemesterKey) -> bool {
    request.academic_year == key.academic_year
        && state
            .teachers
            .get(&request.teacher)
            .is_some_and(|teacher| teacher.department == key.department)
}

/// Bulk-rejects every Pending request in scope once the submission deadline
/// has passed. Returns the rejected request ids; empty when the gate has
/// not passed or the action was already applied.
pub fn apply_student_request_cancellation(
    state: &mut State,
    key: &SemesterKey,
    now: DateTime<Utc>,
) -> Result<Vec<RequestId>, CoreError> {
    let config = state
        .semesters
        .get(key)
        .ok_or_else(|| CoreError::SemesterNotConfigured {
            department: key.department.clone(),
            academic_year: key.academic_year.to_string(),
        })?;
    let Some(deadline) = config.lock_student_requests_date else {
        return Ok(Vec::new());
    };
    if config.student_requests_locked_at.is_some() || now.date_naive() < deadline {
        return Ok(Vec::new());
    }

    let affected: Vec<RequestId> = state
        .requests
        .values()
        .filter(|request| request.status == RequestStatus::Pending && in_scope(state, request, key))
        .map(|request| request.id)
        .collect();

    for id in &affected {
        if let Some(request) = state.requests.get_mut(id) {
            request.status = RequestStatus::Rejected;
            request.rejection_reason = Some(AUTO_REJECT_REASON.to_owned());
            request.completed_at = Some(now);
        }
    }

    if let Some(config) = state.semesters.get_mut(key) {
        config.student_requests_locked_at = Some(now);
    }
    Ok(affected)
}

/// Bulk-locks topic editing on every Active request in scope once the
/// teacher-editing deadline has passed. Returns the locked request ids.
pub fn apply_teacher_editing_lock(
    state: &mut State,
    key: &SemesterKey,
    now: DateTime<Utc>,
) -> Result<Vec<RequestId>, CoreError> {
    let config = state
        .semesters
        .get(key)
        .ok_or_else(|| CoreError::SemesterNotConfigured {
            department: key.department.clone(),
            academic_year: key.academic_year.to_string(),
        })?;
    let Some(deadline) = config.lock_teacher_editing_themes_date else {
        return Ok(Vec::new());
    };
    if config.teacher_editing_locked_at.is_some() || now.date_naive() < deadline {
        return Ok(Vec::new());
    }

    let affected: Vec<RequestId> = state
        .requests
        .values()
        .filter(|request| {
            request.status == RequestStatus::Active
                && !request.topic_locked
                && in_scope(state, request, key)
        })
        .map(|request| request.id)
        .collect();

    for id in &affected {
        if let Some(request) = state.requests.get_mut(id) {
            request.topic_locked = true;
        }
    }

    if let Some(config) = state.semesters.get_mut(key) {
        config.teacher_editing_locked_at = Some(now);
    }
    Ok(affected)
}
