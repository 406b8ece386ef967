//! In-memory transactional store.
//!
//! One mutex serializes every read-check-write sequence; `transaction`
//! applies the closure to a draft copy and swaps it in only on `Ok`, so an
//! operation either commits fully or leaves state unchanged. Losers of a
//! race observe the ordinary typed business failure of whatever check they
//! fail, never a lock error.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::calendar::{SemesterConfig, SemesterKey};
use crate::error::CoreError;
use crate::request::{Request, RequestStatus, WorkType};
use crate::slot::Slot;
use crate::stream::{Stream, StreamCode};
use crate::topic::TeacherTopic;
use crate::{Department, RequestId, SlotId, StudentId, TeacherId, TopicId};

/// What the engine needs to know about a teacher, synced from the identity
/// service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeacherProfile {
    pub id: TeacherId,
    pub department: Department,
}

/// What the engine needs to know about a student.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentProfile {
    pub id: StudentId,
    /// Academic group code, e.g. `FES-21`; the stream is derived from it.
    pub cohort: String,
}

/// The whole persistent state of the engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct State {
    next_id: u64,
    pub streams: BTreeMap<StreamCode, Stream>,
    pub teachers: BTreeMap<TeacherId, TeacherProfile>,
    pub students: BTreeMap<StudentId, StudentProfile>,
    pub slots: BTreeMap<SlotId, Slot>,
    pub topics: BTreeMap<TopicId, TeacherTopic>,
    pub requests: BTreeMap<RequestId, Request>,
    // Serialized as a list: the composite key is not a JSON object key.
    #[serde(with = "semesters_as_list")]
    pub semesters: BTreeMap<SemesterKey, SemesterConfig>,
}

mod semesters_as_list {
    use serde::ser::SerializeSeq;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::{BTreeMap, SemesterConfig, SemesterKey};

    pub fn serialize<S: Serializer>(
        map: &BTreeMap<SemesterKey, SemesterConfig>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(map.len()))?;
        for config in map.values() {
            seq.serialize_element(config)?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<SemesterKey, SemesterConfig>, D::Error> {
        let configs = Vec::<SemesterConfig>::deserialize(deserializer)?;
        Ok(configs
            .into_iter()
            .map(|config| (config.key.clone(), config))
            .collect())
    }
}

impl State {
    pub(crate) fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    pub fn register_stream(&mut self, code: StreamCode, specialty_name: &str) {
        self.streams.insert(
            code,
            Stream {
                code,
                specialty_name: specialty_name.to_owned(),
            },
        );
    }

    pub fn register_teacher(&mut self, department: Department) -> TeacherId {
        let id = TeacherId(self.next_id());
        self.teachers.insert(id, TeacherProfile { id, department });
        id
    }

    pub fn register_student(&mut self, cohort: &str) -> StudentId {
        let id = StudentId(self.next_id());
        self.students.insert(
            id,
            StudentProfile {
                id,
                cohort: cohort.to_owned(),
            },
        );
        id
    }

    /// Creates the slot for the pair, or updates the quota of the existing
    /// one: at most one slot per (teacher, stream). A quota below the
    /// current occupancy is refused, so `occupied <= quota` holds across
    /// the update.
    pub fn register_slot(
        &mut self,
        teacher: TeacherId,
        stream: StreamCode,
        quota: u32,
    ) -> Result<SlotId, CoreError> {
        if let Some(slot) = self
            .slots
            .values_mut()
            .find(|slot| slot.teacher == teacher && slot.stream == stream)
        {
            if quota < slot.occupied {
                return Err(CoreError::CapacityExceeded {
                    slot: slot.id,
                    occupied: slot.occupied,
                    quota,
                });
            }
            slot.quota = quota;
            return Ok(slot.id);
        }
        let id = SlotId(self.next_id());
        self.slots.insert(
            id,
            Slot {
                id,
                teacher,
                stream,
                quota,
                occupied: 0,
            },
        );
        Ok(id)
    }

    pub fn register_topic(
        &mut self,
        teacher: TeacherId,
        title: &str,
        description: &str,
        streams: BTreeSet<StreamCode>,
    ) -> TopicId {
        let id = TopicId(self.next_id());
        self.topics.insert(
            id,
            TeacherTopic {
                id,
                teacher,
                title: title.to_owned(),
                description: description.to_owned(),
                streams,
                is_occupied: false,
                is_active: true,
                is_deleted: false,
                occupied_by: None,
            },
        );
        id
    }

    pub fn put_semester(&mut self, config: SemesterConfig) -> Result<(), CoreError> {
        config.validate()?;
        self.semesters.insert(config.key.clone(), config);
        Ok(())
    }

    pub fn semester(&self, key: &SemesterKey) -> Option<&SemesterConfig> {
        self.semesters.get(key)
    }

    /// The student's Active request, if any. At most one exists.
    pub fn active_request_of(&self, student: StudentId) -> Option<&Request> {
        self.requests
            .values()
            .find(|request| request.student == student && request.status == RequestStatus::Active)
    }

    pub fn pending_requests_of(&self, student: StudentId) -> impl Iterator<Item = &Request> {
        self.requests
            .values()
            .filter(move |request| {
                request.student == student && request.status == RequestStatus::Pending
            })
    }

    /// Read model for the export collaborator: completed requests grouped
    /// by stream and work type.
    pub fn completed_by_stream(&self) -> BTreeMap<(StreamCode, WorkType), Vec<RequestId>> {
        let mut groups: BTreeMap<(StreamCode, WorkType), Vec<RequestId>> = BTreeMap::new();
        for request in self.requests.values() {
            if request.status != RequestStatus::Completed {
                continue;
            }
            if let Some(slot) = self.slots.get(&request.slot) {
                groups
                    .entry((slot.stream, request.work_type))
                    .or_default()
                    .push(request.id);
            }
        }
        groups
    }
}

/// Cloneable handle on the shared state.
#[derive(Clone, Default)]
pub struct Store {
    inner: Arc<Mutex<State>>,
}

impl Store {
    #[must_use]
    pub fn new(state: State) -> Self {
        Self {
            inner: Arc::new(Mutex::new(state)),
        }
    }

    pub fn read<T>(&self, f: impl FnOnce(&State) -> T) -> T {
        let guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    /// Infallible setup writes (seeding reference data).
    pub fn seed<T>(&self, f: impl FnOnce(&mut State) -> T) -> T {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    /// Runs `f` against a draft of the state and commits the draft only on
    /// `Ok`. Any error leaves the state exactly as it was.
    pub fn transaction<T>(
        &self,
        f: impl FnOnce(&mut State) -> Result<T, CoreError>,
    ) -> Result<T, CoreError> {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let mut draft = guard.clone();
        let value = f(&mut draft)?;
        *guard = draft;
        Ok(value)
    }

    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let file = File::open(path)?;
        let state: State = serde_json::from_reader(BufReader::new(file))?;
        Ok(Self::new(state))
    }

    pub fn save(&self, path: &Path) -> Result<(), CoreError> {
        let guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let file = File::create(path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), &*guard)?;
        Ok(())
    }
}
