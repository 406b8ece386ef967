//! End-to-end lifecycle behavior over the in-memory store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{NaiveDate, TimeZone, Utc};
use thesis_supervision_core::calendar::{
    AcademicYear, SemesterConfig, SemesterKey, SemesterNumber, AUTO_REJECT_REASON,
};
use thesis_supervision_core::clock::FixedClock;
use thesis_supervision_core::error::CoreError;
use thesis_supervision_core::event::{ChannelSink, EventKind};
use thesis_supervision_core::lifecycle::{
    ArtifactStore, CreateRequest, Lifecycle, CASCADE_REJECT_REASON,
};
use thesis_supervision_core::request::{RequestStatus, TopicSelection};
use thesis_supervision_core::store::Store;
use thesis_supervision_core::topic::DeleteOutcome;
use thesis_supervision_core::stream::StreamCode;
use thesis_supervision_core::{FileId, RequestId, StudentId, TeacherId};

const DEPARTMENT: &str = "Systems Design";

fn clock() -> Arc<FixedClock> {
    // November 10th: first semester of 2025/26.
    Arc::new(FixedClock(
        Utc.with_ymd_and_hms(2025, 11, 10, 12, 0, 0).unwrap(),
    ))
}

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

fn semester_key() -> SemesterKey {
    SemesterKey {
        department: DEPARTMENT.into(),
        academic_year: AcademicYear::starting(2025),
        semester: SemesterNumber::First,
    }
}

#[derive(Default)]
struct TestArtifacts {
    files: Mutex<HashMap<RequestId, Vec<FileId>>>,
    archived: Mutex<Vec<FileId>>,
}

impl TestArtifacts {
    fn upload(&self, request: RequestId, file: FileId) {
        self.files.lock().unwrap().entry(request).or_default().push(file);
    }
}

impl ArtifactStore for TestArtifacts {
    fn archivable_files(&self, request: RequestId) -> Vec<FileId> {
        self.files
            .lock()
            .unwrap()
            .get(&request)
            .cloned()
            .unwrap_or_default()
    }

    fn mark_archived(&self, _request: RequestId, files: &[FileId]) {
        self.archived.lock().unwrap().extend_from_slice(files);
    }
}

struct Fixture {
    lifecycle: Lifecycle,
    store: Store,
    artifacts: Arc<TestArtifacts>,
    teacher: TeacherId,
}

/// One teacher with one FES-2 slot, semester configured with every gate
/// open and completion allowed since the start of the semester.
fn fixture(quota: u32) -> Fixture {
    let store = Store::default();
    let teacher = store.seed(|state| {
        let stream = StreamCode::parse("FES-2").unwrap();
        state.register_stream(stream, "Computer science");
        let teacher = state.register_teacher(DEPARTMENT.into());
        state.register_slot(teacher, stream, quota).unwrap();
        let mut config = SemesterConfig::new(semester_key());
        config.allow_complete_work_date = Some(date(2025, 9, 1));
        state.put_semester(config).unwrap();
        teacher
    });
    let artifacts = Arc::new(TestArtifacts::default());
    let lifecycle =
        Lifecycle::new(store.clone(), artifacts.clone() as Arc<dyn ArtifactStore>)
            .with_clock(clock());
    Fixture {
        lifecycle,
        store,
        artifacts,
        teacher,
    }
}

fn new_student(store: &Store, cohort: &str) -> StudentId {
    store.seed(|state| state.register_student(cohort))
}

fn create(
    lifecycle: &Lifecycle,
    student: StudentId,
    teacher: TeacherId,
) -> Result<RequestId, CoreError> {
    lifecycle.create_request(CreateRequest {
        student,
        teacher,
        teacher_topic: None,
        proposed_topics: vec!["Sensor networks for dormitories".to_owned()],
        motivation: "I like embedded systems".to_owned(),
        academic_year: None,
    })
}

fn status_of(store: &Store, id: RequestId) -> RequestStatus {
    store.read(|state| state.requests[&id].status)
}

fn occupied_of_slot(store: &Store, teacher: TeacherId) -> u32 {
    store.read(|state| {
        state
            .slots
            .values()
            .find(|slot| slot.teacher == teacher)
            .map(|slot| slot.occupied)
            .unwrap()
    })
}

#[test]
fn scenario_a_last_slot_goes_to_one_student() {
    let fx = fixture(1);
    let student_a = new_student(&fx.store, "FES-21");
    let student_b = new_student(&fx.store, "FES-22");

    let request = create(&fx.lifecycle, student_a, fx.teacher).unwrap();
    assert_eq!(status_of(&fx.store, request), RequestStatus::Pending);
    // Pending does not occupy capacity.
    assert_eq!(occupied_of_slot(&fx.store, fx.teacher), 0);

    fx.lifecycle
        .approve_request(fx.teacher, request, TopicSelection::Proposed(0))
        .unwrap();
    assert_eq!(status_of(&fx.store, request), RequestStatus::Active);
    assert_eq!(occupied_of_slot(&fx.store, fx.teacher), 1);

    assert!(matches!(
        create(&fx.lifecycle, student_b, fx.teacher),
        Err(CoreError::NoAvailableSlot { .. })
    ));
}

#[test]
fn scenario_b_approval_cascade_rejects_other_pending() {
    let fx = fixture(3);
    let other_teacher = fx.store.seed(|state| {
        let teacher = state.register_teacher(DEPARTMENT.into());
        state
            .register_slot(teacher, StreamCode::parse("FES-2").unwrap(), 3)
            .unwrap();
        teacher
    });
    let student = new_student(&fx.store, "FES-21");

    let first = create(&fx.lifecycle, student, fx.teacher).unwrap();
    let second = create(&fx.lifecycle, student, other_teacher).unwrap();

    fx.lifecycle
        .approve_request(fx.teacher, first, TopicSelection::Proposed(0))
        .unwrap();

    assert_eq!(status_of(&fx.store, first), RequestStatus::Active);
    assert_eq!(status_of(&fx.store, second), RequestStatus::Rejected);
    let reason = fx
        .store
        .read(|state| state.requests[&second].rejection_reason.clone())
        .unwrap();
    assert!(reason.contains("auto-cancelled"));
    assert_eq!(reason, CASCADE_REJECT_REASON);
}

#[test]
fn scenario_c_submission_deadline_sweep_is_idempotent() {
    let fx = fixture(2);
    let student = new_student(&fx.store, "FES-21");
    let request = create(&fx.lifecycle, student, fx.teacher).unwrap();

    // Deadline set after the request was submitted.
    fx.store.seed(|state| {
        let config = state.semesters.get_mut(&semester_key()).unwrap();
        config.lock_student_requests_date = Some(date(2025, 11, 9));
    });

    let report = fx.lifecycle.run_deadline_sweep();
    assert_eq!(report.total_rejected(), 1);
    assert_eq!(status_of(&fx.store, request), RequestStatus::Rejected);
    let (reason, completed_at, applied) = fx.store.read(|state| {
        (
            state.requests[&request].rejection_reason.clone(),
            state.requests[&request].completed_at,
            state.semesters[&semester_key()].student_requests_locked_at,
        )
    });
    assert_eq!(reason.as_deref(), Some(AUTO_REJECT_REASON));
    assert_eq!(completed_at, Some(clock().0));
    assert_eq!(applied, Some(clock().0));

    // Second run must not touch anything.
    let rerun = fx.lifecycle.run_deadline_sweep();
    assert_eq!(rerun.total_rejected(), 0);
    let applied_again = fx
        .store
        .read(|state| state.semesters[&semester_key()].student_requests_locked_at);
    assert_eq!(applied_again, applied);
}

#[test]
fn scenario_d_editing_sweep_locks_topics() {
    let fx = fixture(2);
    let student = new_student(&fx.store, "FES-21");
    let request = create(&fx.lifecycle, student, fx.teacher).unwrap();
    fx.lifecycle
        .approve_request(fx.teacher, request, TopicSelection::Proposed(0))
        .unwrap();
    assert!(fx
        .lifecycle
        .update_request_topic(fx.teacher, request, "Refined wording")
        .is_ok());

    fx.store.seed(|state| {
        let config = state.semesters.get_mut(&semester_key()).unwrap();
        config.lock_teacher_editing_themes_date = Some(date(2025, 11, 9));
    });

    let report = fx.lifecycle.run_deadline_sweep();
    assert_eq!(report.total_locked(), 1);
    assert!(fx.store.read(|state| state.requests[&request].topic_locked));

    assert!(matches!(
        fx.lifecycle
            .update_request_topic(fx.teacher, request, "Too late"),
        Err(CoreError::TopicLocked { .. })
    ));
}

#[test]
fn scenario_e_completion_needs_an_archivable_file() {
    let fx = fixture(2);
    let student = new_student(&fx.store, "FES-21");
    let request = create(&fx.lifecycle, student, fx.teacher).unwrap();
    fx.lifecycle
        .approve_request(fx.teacher, request, TopicSelection::Proposed(0))
        .unwrap();

    assert!(matches!(
        fx.lifecycle.complete_request(fx.teacher, request, 90, &[]),
        Err(CoreError::NoArchivableFiles { .. })
    ));
    assert_eq!(status_of(&fx.store, request), RequestStatus::Active);
}

#[test]
fn round_trip_releases_topic_and_slot() {
    let fx = fixture(1);
    let student = new_student(&fx.store, "FES-21");
    let topic = fx.store.seed(|state| {
        state.register_topic(
            fx.teacher,
            "FPGA-based signal filtering",
            "",
            [StreamCode::parse("FES-2").unwrap()].into(),
        )
    });

    let request = fx
        .lifecycle
        .create_request(CreateRequest {
            student,
            teacher: fx.teacher,
            teacher_topic: Some(topic),
            proposed_topics: Vec::new(),
            motivation: String::new(),
            academic_year: None,
        })
        .unwrap();
    fx.lifecycle
        .approve_request(fx.teacher, request, TopicSelection::TeacherTopic)
        .unwrap();
    assert!(fx.store.read(|state| state.topics[&topic].is_occupied));
    assert_eq!(occupied_of_slot(&fx.store, fx.teacher), 1);
    let frozen = fx
        .store
        .read(|state| state.requests[&request].topic_text.clone());
    assert_eq!(frozen.as_deref(), Some("FPGA-based signal filtering"));

    fx.artifacts.upload(request, FileId(7));
    fx.lifecycle
        .complete_request(fx.teacher, request, 95, &[FileId(7)])
        .unwrap();

    assert_eq!(status_of(&fx.store, request), RequestStatus::Completed);
    assert!(!fx.store.read(|state| state.topics[&topic].is_occupied));
    assert_eq!(occupied_of_slot(&fx.store, fx.teacher), 0);
    assert_eq!(
        fx.store.read(|state| state.requests[&request].grade),
        Some(95)
    );
    assert!(fx.store.read(|state| state.requests[&request].topic_locked));
    assert_eq!(fx.artifacts.archived.lock().unwrap().as_slice(), &[FileId(7)]);
}

#[test]
fn one_active_request_per_student() {
    let fx = fixture(3);
    let student = new_student(&fx.store, "FES-21");
    let request = create(&fx.lifecycle, student, fx.teacher).unwrap();
    fx.lifecycle
        .approve_request(fx.teacher, request, TopicSelection::Proposed(0))
        .unwrap();

    assert!(matches!(
        create(&fx.lifecycle, student, fx.teacher),
        Err(CoreError::ActiveRequestExists { .. })
    ));
}

#[test]
fn creation_respects_the_submission_deadline() {
    let fx = fixture(2);
    let student = new_student(&fx.store, "FES-21");
    fx.store.seed(|state| {
        let config = state.semesters.get_mut(&semester_key()).unwrap();
        config.lock_student_requests_date = Some(date(2025, 11, 9));
    });

    assert!(matches!(
        create(&fx.lifecycle, student, fx.teacher),
        Err(CoreError::DeadlinePassed)
    ));
}

#[test]
fn creation_requires_a_configured_semester() {
    let fx = fixture(2);
    let student = new_student(&fx.store, "FES-21");
    fx.store.seed(|state| {
        state.semesters.clear();
    });

    assert!(matches!(
        create(&fx.lifecycle, student, fx.teacher),
        Err(CoreError::SemesterNotConfigured { .. })
    ));
}

#[test]
fn cancellation_window_can_close() {
    let fx = fixture(2);
    let student = new_student(&fx.store, "FES-21");
    let request = create(&fx.lifecycle, student, fx.teacher).unwrap();
    fx.lifecycle
        .approve_request(fx.teacher, request, TopicSelection::Proposed(0))
        .unwrap();

    fx.store.seed(|state| {
        let config = state.semesters.get_mut(&semester_key()).unwrap();
        config.lock_cancel_requests_date = Some(date(2025, 11, 9));
    });

    assert!(matches!(
        fx.lifecycle.cancel_active_request(student, request),
        Err(CoreError::CancellationLocked)
    ));
    // The teacher hits the same gate on an Active request.
    assert!(matches!(
        fx.lifecycle.reject_request(fx.teacher, request, "changed my mind"),
        Err(CoreError::CancellationLocked)
    ));
}

#[test]
fn completion_window_must_be_open() {
    let fx = fixture(2);
    let student = new_student(&fx.store, "FES-21");
    let request = create(&fx.lifecycle, student, fx.teacher).unwrap();
    fx.lifecycle
        .approve_request(fx.teacher, request, TopicSelection::Proposed(0))
        .unwrap();
    fx.artifacts.upload(request, FileId(1));

    fx.store.seed(|state| {
        let config = state.semesters.get_mut(&semester_key()).unwrap();
        config.allow_complete_work_date = Some(date(2026, 6, 1));
    });

    assert!(matches!(
        fx.lifecycle
            .complete_request(fx.teacher, request, 80, &[FileId(1)]),
        Err(CoreError::CompletionNotAllowed)
    ));
}

#[test]
fn concurrent_approvals_leave_exactly_one_active() {
    let fx = fixture(3);
    let other_teacher = fx.store.seed(|state| {
        let teacher = state.register_teacher(DEPARTMENT.into());
        state
            .register_slot(teacher, StreamCode::parse("FES-2").unwrap(), 3)
            .unwrap();
        teacher
    });
    let student = new_student(&fx.store, "FES-21");
    let first = create(&fx.lifecycle, student, fx.teacher).unwrap();
    let second = create(&fx.lifecycle, student, other_teacher).unwrap();

    let lifecycle = Arc::new(fx.lifecycle);
    let handles: Vec<_> = [(fx.teacher, first), (other_teacher, second)]
        .into_iter()
        .map(|(teacher, request)| {
            let lifecycle = Arc::clone(&lifecycle);
            std::thread::spawn(move || {
                lifecycle.approve_request(teacher, request, TopicSelection::Proposed(0))
            })
        })
        .collect();
    let outcomes: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect();

    assert_eq!(outcomes.iter().filter(|outcome| outcome.is_ok()).count(), 1);
    let active = fx.store.read(|state| {
        state
            .requests
            .values()
            .filter(|request| request.status == RequestStatus::Active)
            .count()
    });
    assert_eq!(active, 1);
}

#[test]
fn racing_for_the_last_slot_rejects_the_second_approval() {
    let fx = fixture(1);
    let student_a = new_student(&fx.store, "FES-21");
    let student_b = new_student(&fx.store, "FES-22");
    let first = create(&fx.lifecycle, student_a, fx.teacher).unwrap();
    let second = create(&fx.lifecycle, student_b, fx.teacher).unwrap();

    fx.lifecycle
        .approve_request(fx.teacher, first, TopicSelection::Proposed(0))
        .unwrap();
    assert!(matches!(
        fx.lifecycle
            .approve_request(fx.teacher, second, TopicSelection::Proposed(0)),
        Err(CoreError::NoAvailableSlot { .. })
    ));
    assert_eq!(status_of(&fx.store, second), RequestStatus::Pending);
}

#[test]
fn deleting_a_topic_in_use_is_softened() {
    let fx = fixture(2);
    let student = new_student(&fx.store, "FES-21");
    let topic = fx.store.seed(|state| {
        state.register_topic(
            fx.teacher,
            "Mesh networking",
            "",
            [StreamCode::parse("FES-2").unwrap()].into(),
        )
    });
    fx.lifecycle
        .create_request(CreateRequest {
            student,
            teacher: fx.teacher,
            teacher_topic: Some(topic),
            proposed_topics: Vec::new(),
            motivation: String::new(),
            academic_year: None,
        })
        .unwrap();

    let outcome = fx.lifecycle.delete_topic(fx.teacher, topic, false).unwrap();
    assert_eq!(outcome, DeleteOutcome::Soft);
    let (is_deleted, is_active) = fx
        .store
        .read(|state| (state.topics[&topic].is_deleted, state.topics[&topic].is_active));
    assert!(is_deleted);
    assert!(!is_active);

    // Forcing the delete removes the topic for good.
    let outcome = fx.lifecycle.delete_topic(fx.teacher, topic, true).unwrap();
    assert_eq!(outcome, DeleteOutcome::Hard);
    assert!(!fx.store.read(|state| state.topics.contains_key(&topic)));
}

#[test]
fn topic_editing_follows_the_editing_deadline() {
    let fx = fixture(2);
    let topic = fx
        .lifecycle
        .create_topic(
            fx.teacher,
            "Battery modelling",
            "",
            [StreamCode::parse("FES-2").unwrap()].into(),
        )
        .unwrap();

    fx.lifecycle
        .update_topic(fx.teacher, topic, "Battery modelling at scale", "fleet data")
        .unwrap();
    let (title, description) = fx.store.read(|state| {
        (
            state.topics[&topic].title.clone(),
            state.topics[&topic].description.clone(),
        )
    });
    assert_eq!(title, "Battery modelling at scale");
    assert_eq!(description, "fleet data");

    fx.store.seed(|state| {
        let config = state.semesters.get_mut(&semester_key()).unwrap();
        config.lock_teacher_editing_themes_date = Some(date(2025, 11, 9));
    });
    assert!(matches!(
        fx.lifecycle.update_topic(fx.teacher, topic, "Too late", ""),
        Err(CoreError::DeadlinePassed)
    ));
}

#[test]
fn occupied_topics_cannot_be_reworded() {
    let fx = fixture(2);
    let student = new_student(&fx.store, "FES-21");
    let topic = fx.store.seed(|state| {
        state.register_topic(
            fx.teacher,
            "Indoor positioning",
            "",
            [StreamCode::parse("FES-2").unwrap()].into(),
        )
    });
    let request = fx
        .lifecycle
        .create_request(CreateRequest {
            student,
            teacher: fx.teacher,
            teacher_topic: Some(topic),
            proposed_topics: Vec::new(),
            motivation: String::new(),
            academic_year: None,
        })
        .unwrap();
    fx.lifecycle
        .approve_request(fx.teacher, request, TopicSelection::TeacherTopic)
        .unwrap();

    assert!(matches!(
        fx.lifecycle.update_topic(fx.teacher, topic, "New title", ""),
        Err(CoreError::TopicAlreadyOccupied { .. })
    ));
}

#[test]
fn transitions_outside_the_table_are_refused() {
    let fx = fixture(2);
    let student = new_student(&fx.store, "FES-21");
    let request = create(&fx.lifecycle, student, fx.teacher).unwrap();

    // Completing a Pending request would skip Active.
    fx.artifacts.upload(request, FileId(1));
    assert!(matches!(
        fx.lifecycle
            .complete_request(fx.teacher, request, 90, &[FileId(1)]),
        Err(CoreError::InvalidTransition { .. })
    ));

    fx.lifecycle
        .approve_request(fx.teacher, request, TopicSelection::Proposed(0))
        .unwrap();
    assert!(matches!(
        fx.lifecycle
            .approve_request(fx.teacher, request, TopicSelection::Proposed(0)),
        Err(CoreError::InvalidTransition { .. })
    ));

    fx.lifecycle
        .complete_request(fx.teacher, request, 90, &[FileId(1)])
        .unwrap();
    assert!(matches!(
        fx.lifecycle.reject_request(fx.teacher, request, "late"),
        Err(CoreError::InvalidTransition { .. })
    ));
}

#[test]
fn lifecycle_emits_events_after_commit() {
    let fx = fixture(2);
    let (sink, mut events) = ChannelSink::new();
    let lifecycle = Lifecycle::new(
        fx.store.clone(),
        Arc::new(TestArtifacts::default()) as Arc<dyn ArtifactStore>,
    )
    .with_clock(clock())
    .with_sink(Arc::new(sink));
    let student = new_student(&fx.store, "FES-21");

    let request = create(&lifecycle, student, fx.teacher).unwrap();
    lifecycle
        .approve_request(fx.teacher, request, TopicSelection::Proposed(0))
        .unwrap();

    assert_eq!(events.try_recv().unwrap().kind, EventKind::RequestCreated);
    let approved = events.try_recv().unwrap();
    assert_eq!(approved.kind, EventKind::RequestApproved);
    assert_eq!(approved.request, request);
    assert!(events.try_recv().is_err());
}

#[test]
fn failed_creation_emits_nothing_and_changes_nothing() {
    let fx = fixture(2);
    let (sink, mut events) = ChannelSink::new();
    let lifecycle = Lifecycle::new(
        fx.store.clone(),
        Arc::new(TestArtifacts::default()) as Arc<dyn ArtifactStore>,
    )
    .with_clock(clock())
    .with_sink(Arc::new(sink));
    let student = new_student(&fx.store, "FES-21");

    let result = lifecycle.create_request(CreateRequest {
        student,
        teacher: fx.teacher,
        teacher_topic: None,
        proposed_topics: Vec::new(),
        motivation: String::new(),
        academic_year: None,
    });
    assert!(matches!(result, Err(CoreError::Validation(_))));
    assert!(events.try_recv().is_err());
    assert_eq!(fx.store.read(|state| state.requests.len()), 0);
}
