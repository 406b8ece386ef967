//! The request aggregate: one student's bid for supervision by one teacher.

use core::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::calendar::AcademicYear;
use crate::store::State;
use crate::stream::StreamCode;
use crate::{RequestId, SlotId, StudentId, TeacherId, TopicId};

/// Closed set of request states. Rejected and Completed are terminal, and
/// nothing ever re-enters Pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestStatus {
    Pending,
    Active,
    Rejected,
    Completed,
}

impl RequestStatus {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Rejected | Self::Completed)
    }

    /// The transition table of the lifecycle state machine.
    pub const fn can_transition_to(self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::Pending, Self::Active | Self::Rejected)
                | (Self::Active, Self::Rejected | Self::Completed)
        )
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Rejected => "rejected",
            Self::Completed => "completed",
        })
    }
}

/// Kind of supervised work, derived from the stream at creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum WorkType {
    Coursework,
    Thesis,
    MasterThesis,
}

impl WorkType {
    pub const fn derive(stream: StreamCode) -> Self {
        if stream.is_master() {
            Self::MasterThesis
        } else if stream.course == 4 {
            Self::Thesis
        } else {
            Self::Coursework
        }
    }
}

/// Which topic the teacher confirms when accepting a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicSelection {
    /// The teacher topic the request was created against.
    TeacherTopic,
    /// One of the student's proposed free-text topics, by index.
    Proposed(usize),
    /// A custom topic written at confirmation time.
    Custom(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub id: RequestId,
    pub student: StudentId,
    pub teacher: TeacherId,
    pub slot: SlotId,
    /// Teacher topic the student picked, if any. The claim on it is only
    /// taken at approval.
    pub teacher_topic: Option<TopicId>,
    /// Student-proposed free-text topics, at most three.
    pub proposed_topics: Vec<String>,
    /// The proposed topic the teacher approved, if that is what was chosen.
    pub approved_topic: Option<String>,
    /// Custom topic written by the teacher at confirmation time.
    pub custom_topic: Option<String>,
    /// Display text frozen when the request first becomes Active.
    pub topic_text: Option<String>,
    pub motivation: String,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub grade: Option<u8>,
    pub rejection_reason: Option<String>,
    pub academic_year: AcademicYear,
    pub topic_locked: bool,
    pub work_type: WorkType,
}

impl Request {
    /// Human-readable topic, preferring the most specific source:
    /// custom text, then the approved student proposal, then the teacher
    /// topic title.
    pub fn topic_display<'a>(&'a self, state: &'a State) -> Option<&'a str> {
        if let Some(text) = &self.topic_text {
            return Some(text);
        }
        self.resolve_topic(state)
    }

    /// The currently bound topic source, before any freezing.
    pub fn resolve_topic<'a>(&'a self, state: &'a State) -> Option<&'a str> {
        if let Some(custom) = &self.custom_topic {
            return Some(custom);
        }
        if let Some(approved) = &self.approved_topic {
            return Some(approved);
        }
        self.teacher_topic
            .and_then(|id| state.topics.get(&id))
            .map(|topic| topic.title.as_str())
    }
}
