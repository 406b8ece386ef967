//! The request lifecycle: every operation collaborators may call on the
//! engine.
//!
//! Operations run as one store transaction each (commit fully or change
//! nothing) and hand their domain events to the sink only after the commit.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::calendar::{AcademicYear, SemesterConfig, SemesterKey, SemesterNumber};
use crate::clock::{Clock, SystemClock};
use crate::error::CoreError;
use crate::event::{Actor, DomainEvent, EventKind, EventSink, NullSink};
use crate::request::{Request, RequestStatus, TopicSelection, WorkType};
use crate::slot::{self, Slot};
use crate::store::{State, Store};
use crate::stream::StreamCode;
use crate::topic::{self, DeleteOutcome};
use crate::{Department, FileId, RequestId, StudentId, TeacherId, TopicId};

/// Reason stamped on a student's other Pending requests when one of them is
/// accepted.
pub const CASCADE_REJECT_REASON: &str = "auto-cancelled: another request was accepted";

const MAX_PROPOSED_TOPICS: usize = 3;
const MAX_MOTIVATION_CHARS: usize = 2000;

/// File-storage collaborator, consulted only at completion time.
pub trait ArtifactStore: Send + Sync {
    /// Files uploaded for the request that may be archived.
    fn archivable_files(&self, request: RequestId) -> Vec<FileId>;
    /// Marks the given files archived. Called after the completing
    /// transaction has committed.
    fn mark_archived(&self, request: RequestId, files: &[FileId]);
}

/// Input of [`Lifecycle::create_request`].
#[derive(Debug, Clone)]
pub struct CreateRequest {
    pub student: StudentId,
    pub teacher: TeacherId,
    /// Teacher topic the student picked, if any.
    pub teacher_topic: Option<TopicId>,
    /// Student-proposed free-text topics, at most three.
    pub proposed_topics: Vec<String>,
    pub motivation: String,
    /// Defaults to the academic year the current date falls into.
    pub academic_year: Option<AcademicYear>,
}

/// The engine's service facade.
pub struct Lifecycle {
    store: Store,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn EventSink>,
    artifacts: Arc<dyn ArtifactStore>,
}

impl Lifecycle {
    pub fn new(store: Store, artifacts: Arc<dyn ArtifactStore>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            sink: Arc::new(NullSink),
            artifacts,
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub(crate) fn clock(&self) -> &dyn Clock {
        &*self.clock
    }

    pub(crate) fn sink(&self) -> &dyn EventSink {
        &*self.sink
    }

    fn commit<T>(
        &self,
        f: impl FnOnce(&mut State) -> Result<(T, Vec<DomainEvent>), CoreError>,
    ) -> Result<T, CoreError> {
        let (value, events) = self.store.transaction(f)?;
        for event in events {
            self.sink.emit(event);
        }
        Ok(value)
    }

    /// Student submits a supervision request. The slot is picked here, but
    /// Pending requests do not occupy capacity; only Active ones do.
    pub fn create_request(&self, input: CreateRequest) -> Result<RequestId, CoreError> {
        let now = self.clock.now();
        let today = now.date_naive();

        let id = self.commit(|state| {
            let student = state
                .students
                .get(&input.student)
                .ok_or(CoreError::StudentNotFound(input.student))?;
            let teacher = state
                .teachers
                .get(&input.teacher)
                .ok_or(CoreError::TeacherNotFound(input.teacher))?;

            if let Some(active) = state.active_request_of(input.student) {
                debug!(request = %active.id, "student already has an active request");
                return Err(CoreError::ActiveRequestExists {
                    student: input.student,
                });
            }

            let proposed: Vec<String> = input
                .proposed_topics
                .iter()
                .map(|topic| topic.trim())
                .filter(|topic| !topic.is_empty())
                .map(str::to_owned)
                .collect();
            if input.teacher_topic.is_none() && proposed.is_empty() {
                return Err(CoreError::Validation(
                    "pick a proposed topic or enter your own".to_owned(),
                ));
            }
            if proposed.len() > MAX_PROPOSED_TOPICS {
                return Err(CoreError::Validation(
                    "at most three own topics may be entered".to_owned(),
                ));
            }
            if input.motivation.chars().count() > MAX_MOTIVATION_CHARS {
                return Err(CoreError::Validation(
                    "motivation text is too long".to_owned(),
                ));
            }

            if let Some(topic_id) = input.teacher_topic {
                let topic = state
                    .topics
                    .get(&topic_id)
                    .ok_or(CoreError::TopicNotFound(topic_id))?;
                if topic.teacher != input.teacher {
                    return Err(CoreError::Validation(
                        "topic belongs to a different teacher".to_owned(),
                    ));
                }
                if topic.is_occupied || topic.is_deleted || !topic.is_active {
                    return Err(CoreError::TopicAlreadyOccupied { topic: topic_id });
                }
            }

            let academic_year = input
                .academic_year
                .unwrap_or_else(|| AcademicYear::from_date(today));
            let config = require_semester(state, &teacher.department, academic_year, today)?;
            if !config.can_create_request(today) {
                return Err(CoreError::DeadlinePassed);
            }

            let stream = StreamCode::from_cohort(&student.cohort)?;
            if !state.streams.contains_key(&stream) {
                return Err(CoreError::StreamNotFound(stream.to_string()));
            }
            let slot = slot::reserve(state, input.teacher, stream)?;
            let work_type = WorkType::derive(stream);

            let id = RequestId(state.next_id());
            state.requests.insert(
                id,
                Request {
                    id,
                    student: input.student,
                    teacher: input.teacher,
                    slot,
                    teacher_topic: input.teacher_topic,
                    proposed_topics: proposed,
                    approved_topic: None,
                    custom_topic: None,
                    topic_text: None,
                    motivation: input.motivation.clone(),
                    status: RequestStatus::Pending,
                    created_at: now,
                    completed_at: None,
                    grade: None,
                    rejection_reason: None,
                    academic_year,
                    topic_locked: false,
                    work_type,
                },
            );
            info!(request = %id, student = %input.student, teacher = %input.teacher, %stream, "request created");

            let events = vec![DomainEvent {
                kind: EventKind::RequestCreated,
                request: id,
                actor: Actor::Student(input.student),
                counterpart: Actor::Teacher(input.teacher),
                at: now,
                template: "request_created",
            }];
            Ok((id, events))
        })?;
        Ok(id)
    }

    /// Teacher accepts a Pending request with a confirmed topic. Every
    /// other Pending request of the same student is cascade-rejected.
    pub fn approve_request(
        &self,
        teacher: TeacherId,
        request_id: RequestId,
        selection: TopicSelection,
    ) -> Result<(), CoreError> {
        let now = self.clock.now();

        self.commit(|state| {
            let request = state
                .requests
                .get(&request_id)
                .ok_or(CoreError::RequestNotFound(request_id))?;
            if request.teacher != teacher {
                return Err(CoreError::Forbidden("request belongs to another teacher"));
            }
            if !request.status.can_transition_to(RequestStatus::Active) {
                return Err(CoreError::InvalidTransition {
                    id: request_id,
                    from: request.status,
                    to: RequestStatus::Active,
                });
            }
            let student = request.student;
            let slot_id = request.slot;
            let bound_topic = request.teacher_topic;

            if state.active_request_of(student).is_some() {
                return Err(CoreError::ActiveRequestExists { student });
            }

            // Resolve the confirmed topic text before mutating anything.
            let (approved, custom, resolved) = match &selection {
                TopicSelection::TeacherTopic => {
                    let topic_id = bound_topic.ok_or_else(|| {
                        CoreError::Validation("request has no teacher topic bound".to_owned())
                    })?;
                    let title = state
                        .topics
                        .get(&topic_id)
                        .ok_or(CoreError::TopicNotFound(topic_id))?
                        .title
                        .clone();
                    topic::claim(state, topic_id, request_id)?;
                    (None, None, title)
                }
                TopicSelection::Proposed(index) => {
                    let text = state.requests[&request_id]
                        .proposed_topics
                        .get(*index)
                        .cloned()
                        .ok_or_else(|| {
                            CoreError::Validation("no such proposed topic".to_owned())
                        })?;
                    (Some(text.clone()), None, text)
                }
                TopicSelection::Custom(text) => {
                    let text = text.trim().to_owned();
                    if text.is_empty() {
                        return Err(CoreError::Validation(
                            "custom topic must not be empty".to_owned(),
                        ));
                    }
                    (None, Some(text.clone()), text)
                }
            };

            // Time has passed since the request went Pending; re-check the
            // slot before occupying it.
            slot::recompute_occupied(state, slot_id)?;
            let slot = state
                .slots
                .get(&slot_id)
                .ok_or(CoreError::SlotNotFound(slot_id))?;
            if !slot.has_capacity() {
                return Err(CoreError::NoAvailableSlot {
                    teacher,
                    stream: slot.stream.to_string(),
                });
            }

            let mut events = Vec::new();

            let cascade: Vec<RequestId> = state
                .pending_requests_of(student)
                .filter(|other| other.id != request_id)
                .map(|other| other.id)
                .collect();
            for other_id in &cascade {
                if let Some(other) = state.requests.get_mut(other_id) {
                    other.status = RequestStatus::Rejected;
                    other.rejection_reason = Some(CASCADE_REJECT_REASON.to_owned());
                    events.push(DomainEvent {
                        kind: EventKind::RequestRejected,
                        request: *other_id,
                        actor: Actor::System,
                        counterpart: Actor::Student(student),
                        at: now,
                        template: "request_cascade_rejected",
                    });
                }
            }

            let request = state
                .requests
                .get_mut(&request_id)
                .ok_or(CoreError::RequestNotFound(request_id))?;
            request.status = RequestStatus::Active;
            request.approved_topic = approved;
            request.custom_topic = custom;
            // Entering Active freezes the display text; the editable flag
            // stays open until the sweep or completion locks it.
            if request.topic_text.is_none() {
                request.topic_text = Some(resolved);
            }

            slot::recompute_occupied(state, slot_id)?;
            info!(request = %request_id, %teacher, cascaded = cascade.len(), "request approved");

            events.push(DomainEvent {
                kind: EventKind::RequestApproved,
                request: request_id,
                actor: Actor::Teacher(teacher),
                counterpart: Actor::Student(student),
                at: now,
                template: "request_approved",
            });
            Ok(((), events))
        })
    }

    /// Teacher rejects a Pending or Active request.
    pub fn reject_request(
        &self,
        teacher: TeacherId,
        request_id: RequestId,
        reason: &str,
    ) -> Result<(), CoreError> {
        let now = self.clock.now();
        let today = now.date_naive();

        self.commit(|state| {
            let request = state
                .requests
                .get(&request_id)
                .ok_or(CoreError::RequestNotFound(request_id))?;
            if request.teacher != teacher {
                return Err(CoreError::Forbidden("request belongs to another teacher"));
            }
            if !request.status.can_transition_to(RequestStatus::Rejected) {
                return Err(CoreError::InvalidTransition {
                    id: request_id,
                    from: request.status,
                    to: RequestStatus::Rejected,
                });
            }
            let was_active = request.status == RequestStatus::Active;
            let student = request.student;
            let academic_year = request.academic_year;

            if was_active {
                assert_cancellation_open(state, teacher, academic_year, today)?;
            }

            let request = state
                .requests
                .get_mut(&request_id)
                .ok_or(CoreError::RequestNotFound(request_id))?;
            request.status = RequestStatus::Rejected;
            request.rejection_reason = Some(reason.to_owned());
            if was_active {
                leave_active(state, request_id)?;
            }
            info!(request = %request_id, %teacher, "request rejected");

            let events = vec![DomainEvent {
                kind: EventKind::RequestRejected,
                request: request_id,
                actor: Actor::Teacher(teacher),
                counterpart: Actor::Student(student),
                at: now,
                template: "request_rejected",
            }];
            Ok(((), events))
        })
    }

    /// Student withdraws their Active engagement, while the cancellation
    /// window is still open.
    pub fn cancel_active_request(
        &self,
        student: StudentId,
        request_id: RequestId,
    ) -> Result<(), CoreError> {
        let now = self.clock.now();
        let today = now.date_naive();

        self.commit(|state| {
            let request = state
                .requests
                .get(&request_id)
                .ok_or(CoreError::RequestNotFound(request_id))?;
            if request.student != student {
                return Err(CoreError::Forbidden("request belongs to another student"));
            }
            if request.status != RequestStatus::Active {
                return Err(CoreError::InvalidTransition {
                    id: request_id,
                    from: request.status,
                    to: RequestStatus::Rejected,
                });
            }
            let teacher = request.teacher;
            let academic_year = request.academic_year;
            assert_cancellation_open(state, teacher, academic_year, today)?;

            let request = state
                .requests
                .get_mut(&request_id)
                .ok_or(CoreError::RequestNotFound(request_id))?;
            request.status = RequestStatus::Rejected;
            request.rejection_reason = Some("cancelled by student".to_owned());
            leave_active(state, request_id)?;
            info!(request = %request_id, %student, "request cancelled by student");

            let events = vec![DomainEvent {
                kind: EventKind::RequestRejected,
                request: request_id,
                actor: Actor::Student(student),
                counterpart: Actor::Teacher(teacher),
                at: now,
                template: "request_cancelled",
            }];
            Ok(((), events))
        })
    }

    /// Teacher completes an Active request with a grade. Refuses when the
    /// completion window has not opened or no file is left for archival.
    pub fn complete_request(
        &self,
        teacher: TeacherId,
        request_id: RequestId,
        grade: u8,
        archived_files: &[FileId],
    ) -> Result<(), CoreError> {
        let now = self.clock.now();
        let today = now.date_naive();

        self.commit(|state| {
            let request = state
                .requests
                .get(&request_id)
                .ok_or(CoreError::RequestNotFound(request_id))?;
            if request.teacher != teacher {
                return Err(CoreError::Forbidden("request belongs to another teacher"));
            }
            if !request.status.can_transition_to(RequestStatus::Completed) {
                return Err(CoreError::InvalidTransition {
                    id: request_id,
                    from: request.status,
                    to: RequestStatus::Completed,
                });
            }
            let student = request.student;
            let academic_year = request.academic_year;

            let department = state
                .teachers
                .get(&teacher)
                .ok_or(CoreError::TeacherNotFound(teacher))?
                .department
                .clone();
            let config = require_semester(state, &department, academic_year, today)?;
            if !config.can_complete(today) {
                return Err(CoreError::CompletionNotAllowed);
            }

            if grade > 100 {
                return Err(CoreError::Validation(
                    "grade must be between 0 and 100".to_owned(),
                ));
            }

            let archivable = self.artifacts.archivable_files(request_id);
            if archived_files.is_empty()
                || !archived_files.iter().all(|file| archivable.contains(file))
            {
                return Err(CoreError::NoArchivableFiles {
                    request: request_id,
                });
            }

            let request = state
                .requests
                .get_mut(&request_id)
                .ok_or(CoreError::RequestNotFound(request_id))?;
            request.status = RequestStatus::Completed;
            request.grade = Some(grade);
            request.completed_at = Some(now);
            request.topic_locked = true;
            leave_active(state, request_id)?;
            info!(request = %request_id, %teacher, grade, "request completed");

            let events = vec![DomainEvent {
                kind: EventKind::RequestCompleted,
                request: request_id,
                actor: Actor::Teacher(teacher),
                counterpart: Actor::Student(student),
                at: now,
                template: "request_completed",
            }];
            Ok(((), events))
        })?;

        self.artifacts.mark_archived(request_id, archived_files);
        Ok(())
    }

    /// Teacher rewords the confirmed topic of an Active request, until the
    /// editing deadline locks it.
    pub fn update_request_topic(
        &self,
        teacher: TeacherId,
        request_id: RequestId,
        text: &str,
    ) -> Result<(), CoreError> {
        let today = self.clock.today();

        self.commit(|state| {
            let request = state
                .requests
                .get(&request_id)
                .ok_or(CoreError::RequestNotFound(request_id))?;
            if request.teacher != teacher {
                return Err(CoreError::Forbidden("request belongs to another teacher"));
            }
            if request.topic_locked {
                return Err(CoreError::TopicLocked {
                    request: request_id,
                });
            }
            if request.status != RequestStatus::Active {
                return Err(CoreError::Validation(
                    "only the topic of an active request can be edited".to_owned(),
                ));
            }
            let academic_year = request.academic_year;
            assert_editing_open(state, teacher, academic_year, today)?;

            let text = text.trim();
            if text.is_empty() {
                return Err(CoreError::Validation("topic must not be empty".to_owned()));
            }
            let request = state
                .requests
                .get_mut(&request_id)
                .ok_or(CoreError::RequestNotFound(request_id))?;
            request.custom_topic = Some(text.to_owned());
            request.topic_text = Some(text.to_owned());
            Ok(((), Vec::new()))
        })
    }

    /// Teacher proposes a topic, while theme editing is still open.
    pub fn create_topic(
        &self,
        teacher: TeacherId,
        title: &str,
        description: &str,
        streams: BTreeSet<StreamCode>,
    ) -> Result<TopicId, CoreError> {
        let today = self.clock.today();

        self.commit(|state| {
            if !state.teachers.contains_key(&teacher) {
                return Err(CoreError::TeacherNotFound(teacher));
            }
            let academic_year = AcademicYear::from_date(today);
            assert_editing_open(state, teacher, academic_year, today)?;

            let title = title.trim();
            if title.is_empty() {
                return Err(CoreError::Validation("topic title must not be empty".to_owned()));
            }
            let id = state.register_topic(teacher, title, description, streams);
            Ok((id, Vec::new()))
        })
    }

    /// Teacher rewords a proposed topic, while theme editing is still open
    /// and no request holds a claim on it.
    pub fn update_topic(
        &self,
        teacher: TeacherId,
        topic_id: TopicId,
        title: &str,
        description: &str,
    ) -> Result<(), CoreError> {
        let today = self.clock.today();

        self.commit(|state| {
            assert_topic_owner(state, teacher, topic_id)?;
            let topic = state
                .topics
                .get(&topic_id)
                .ok_or(CoreError::TopicNotFound(topic_id))?;
            if topic.is_occupied {
                return Err(CoreError::TopicAlreadyOccupied { topic: topic_id });
            }
            let academic_year = AcademicYear::from_date(today);
            assert_editing_open(state, teacher, academic_year, today)?;

            let title = title.trim();
            if title.is_empty() {
                return Err(CoreError::Validation("topic title must not be empty".to_owned()));
            }
            let topic = state
                .topics
                .get_mut(&topic_id)
                .ok_or(CoreError::TopicNotFound(topic_id))?;
            topic.title = title.to_owned();
            topic.description = description.to_owned();
            Ok(((), Vec::new()))
        })
    }

    /// Deletes a topic, reporting whether the delete was hard or had to be
    /// softened because a live request still references it.
    pub fn delete_topic(
        &self,
        teacher: TeacherId,
        topic_id: TopicId,
        force: bool,
    ) -> Result<DeleteOutcome, CoreError> {
        self.commit(|state| {
            assert_topic_owner(state, teacher, topic_id)?;
            let outcome = topic::delete(state, topic_id, force)?;
            debug!(topic = %topic_id, ?outcome, "topic deleted");
            Ok((outcome, Vec::new()))
        })
    }

    pub fn activate_topic(&self, teacher: TeacherId, topic_id: TopicId) -> Result<(), CoreError> {
        self.commit(|state| {
            assert_topic_owner(state, teacher, topic_id)?;
            topic::activate(state, topic_id)?;
            Ok(((), Vec::new()))
        })
    }

    pub fn deactivate_topic(&self, teacher: TeacherId, topic_id: TopicId) -> Result<(), CoreError> {
        self.commit(|state| {
            assert_topic_owner(state, teacher, topic_id)?;
            topic::deactivate(state, topic_id)?;
            Ok(((), Vec::new()))
        })
    }

    /// Emits the comment notification for the messaging collaborator; the
    /// comment body itself lives outside this engine.
    pub fn record_comment(
        &self,
        actor: Actor,
        request_id: RequestId,
    ) -> Result<(), CoreError> {
        let now = self.clock.now();
        self.commit(|state| {
            let request = state
                .requests
                .get(&request_id)
                .ok_or(CoreError::RequestNotFound(request_id))?;
            let counterpart = match actor {
                Actor::Student(_) | Actor::System => Actor::Teacher(request.teacher),
                Actor::Teacher(_) => Actor::Student(request.student),
            };
            let events = vec![DomainEvent {
                kind: EventKind::CommentAdded,
                request: request_id,
                actor,
                counterpart,
                at: now,
                template: "comment_added",
            }];
            Ok(((), events))
        })
    }

    /// The slot for the pair if it still has spare capacity, reconciled
    /// against the Active request count before display.
    pub fn get_available_slots(
        &self,
        teacher: TeacherId,
        stream: StreamCode,
    ) -> Result<Option<Slot>, CoreError> {
        self.store.transaction(|state| {
            let ids: Vec<_> = state
                .slots
                .values()
                .filter(|slot| slot.teacher == teacher && slot.stream == stream)
                .map(|slot| slot.id)
                .collect();
            for id in ids {
                slot::recompute_occupied(state, id)?;
            }
            Ok(slot::find_available(state, teacher, stream).cloned())
        })
    }
}

fn require_semester<'a>(
    state: &'a State,
    department: &Department,
    academic_year: AcademicYear,
    today: NaiveDate,
) -> Result<&'a SemesterConfig, CoreError> {
    let key = SemesterKey {
        department: department.clone(),
        academic_year,
        semester: SemesterNumber::from_date(today),
    };
    state
        .semesters
        .get(&key)
        .ok_or_else(|| CoreError::SemesterNotConfigured {
            department: department.clone(),
            academic_year: academic_year.to_string(),
        })
}

fn semester_of_teacher<'a>(
    state: &'a State,
    teacher: TeacherId,
    academic_year: AcademicYear,
    today: NaiveDate,
) -> Result<Option<&'a SemesterConfig>, CoreError> {
    let department = &state
        .teachers
        .get(&teacher)
        .ok_or(CoreError::TeacherNotFound(teacher))?
        .department;
    let key = SemesterKey {
        department: department.clone(),
        academic_year,
        semester: SemesterNumber::from_date(today),
    };
    Ok(state.semesters.get(&key))
}

/// A missing config leaves cancellation open; a present one may close it.
fn assert_cancellation_open(
    state: &State,
    teacher: TeacherId,
    academic_year: AcademicYear,
    today: NaiveDate,
) -> Result<(), CoreError> {
    if let Some(config) = semester_of_teacher(state, teacher, academic_year, today)? {
        if config.must_lock_cancellations(today) {
            return Err(CoreError::CancellationLocked);
        }
    }
    Ok(())
}

/// Theme editing requires a configured semester whose editing deadline has
/// not passed.
fn assert_editing_open(
    state: &State,
    teacher: TeacherId,
    academic_year: AcademicYear,
    today: NaiveDate,
) -> Result<(), CoreError> {
    let department = state
        .teachers
        .get(&teacher)
        .ok_or(CoreError::TeacherNotFound(teacher))?
        .department
        .clone();
    let config = require_semester(state, &department, academic_year, today)?;
    if config.must_lock_topic_editing(today) {
        return Err(CoreError::DeadlinePassed);
    }
    Ok(())
}

fn assert_topic_owner(
    state: &State,
    teacher: TeacherId,
    topic_id: TopicId,
) -> Result<(), CoreError> {
    let topic = state
        .topics
        .get(&topic_id)
        .ok_or(CoreError::TopicNotFound(topic_id))?;
    if topic.teacher != teacher {
        return Err(CoreError::Forbidden("topic belongs to another teacher"));
    }
    Ok(())
}

/// Shared bookkeeping for every transition leaving Active: free the claimed
/// teacher topic and reconcile the slot count. Callers flip the status
/// first, so the recompute no longer counts this request.
fn leave_active(state: &mut State, request_id: RequestId) -> Result<(), CoreError> {
    let (slot_id, claimed_topic) = {
        let request = state
            .requests
            .get(&request_id)
            .ok_or(CoreError::RequestNotFound(request_id))?;
        let claimed = request.teacher_topic.filter(|topic_id| {
            state
                .topics
                .get(topic_id)
                .is_some_and(|topic| topic.occupied_by == Some(request_id))
        });
        (request.slot, claimed)
    };
    if let Some(topic_id) = claimed_topic {
        topic::release(state, topic_id)?;
    }
    slot::recompute_occupied(state, slot_id)?;
    Ok(())
}
