//! Core engine for thesis-supervision request workflows.
//!
//! Students request supervision against a teacher's capacity ("slots") for
//! their stream, teachers accept/reject/complete those requests, and a
//! per-department semester calendar drives deadline sweeps that reject stale
//! requests and lock topic editing. Everything user-facing (login, HTML,
//! file storage, push delivery) lives outside this crate and talks to it
//! through [`lifecycle::Lifecycle`] and the [`event::EventSink`] /
//! [`lifecycle::ArtifactStore`] seams.

pub mod calendar;
pub mod clock;
pub mod error;
pub mod event;
pub mod lifecycle;
pub mod request;
pub mod slot;
pub mod store;
pub mod stream;
pub mod sweeper;
pub mod topic;

use core::fmt;

use serde::{Deserialize, Serialize};

pub use crate::error::CoreError;

macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            Serialize,
            Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(
    /// A student principal, as supplied by the identity service.
    StudentId
);
id_type!(
    /// A teacher principal, as supplied by the identity service.
    TeacherId
);
id_type!(
    /// Capacity slot for one (teacher, stream) pair.
    SlotId
);
id_type!(
    /// A teacher-proposed topic.
    TopicId
);
id_type!(
    /// A supervision request.
    RequestId
);
id_type!(
    /// An uploaded artifact tracked by the file-storage collaborator.
    FileId
);

/// Department name, as reported by the identity service.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Department(pub String);

impl fmt::Display for Department {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Department {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}
