//! Teacher-proposed topics and their occupied/active/deleted lifecycle.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::request::RequestStatus;
use crate::store::State;
use crate::stream::StreamCode;
use crate::{RequestId, TeacherId, TopicId};

/// A thesis/project subject proposed by a teacher, pickable by students of
/// the listed streams.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeacherTopic {
    pub id: TopicId,
    pub teacher: TeacherId,
    pub title: String,
    pub description: String,
    pub streams: BTreeSet<StreamCode>,
    pub is_occupied: bool,
    pub is_active: bool,
    pub is_deleted: bool,
    /// The request currently holding the claim, while occupied.
    pub occupied_by: Option<RequestId>,
}

/// What `delete` actually did. A soft delete must be observable by the
/// caller, not silently reported as a hard one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Hard,
    Soft,
}

/// Marks the topic occupied by the given request.
pub fn claim(state: &mut State, topic_id: TopicId, request: RequestId) -> Result<(), CoreError> {
    let topic = state
        .topics
        .get_mut(&topic_id)
        .ok_or(CoreError::TopicNotFound(topic_id))?;
    if topic.is_occupied || topic.is_deleted {
        return Err(CoreError::TopicAlreadyOccupied { topic: topic_id });
    }
    topic.is_occupied = true;
    topic.occupied_by = Some(request);
    Ok(())
}

/// Frees the topic again; called whenever the owning request leaves Active
/// status via Rejected or Completed.
pub fn release(state: &mut State, topic_id: TopicId) -> Result<(), CoreError> {
    let topic = state
        .topics
        .get_mut(&topic_id)
        .ok_or(CoreError::TopicNotFound(topic_id))?;
    topic.is_occupied = false;
    topic.occupied_by = None;
    Ok(())
}

/// Deletes the topic, hard when nothing non-terminal references it (or
/// when forced), soft otherwise.
pub fn delete(state: &mut State, topic_id: TopicId, force: bool) -> Result<DeleteOutcome, CoreError> {
    if !state.topics.contains_key(&topic_id) {
        return Err(CoreError::TopicNotFound(topic_id));
    }
    let in_use = state.requests.values().any(|request| {
        request.teacher_topic == Some(topic_id)
            && matches!(
                request.status,
                RequestStatus::Pending | RequestStatus::Active
            )
    });
    if force || !in_use {
        state.topics.remove(&topic_id);
        return Ok(DeleteOutcome::Hard);
    }
    let topic = state
        .topics
        .get_mut(&topic_id)
        .ok_or(CoreError::TopicNotFound(topic_id))?;
    topic.is_deleted = true;
    topic.is_active = false;
    Ok(DeleteOutcome::Soft)
}

pub fn activate(state: &mut State, topic_id: TopicId) -> Result<(), CoreError> {
    let topic = state
        .topics
        .get_mut(&topic_id)
        .ok_or(CoreError::TopicNotFound(topic_id))?;
    topic.is_active = true;
    topic.is_deleted = false;
    Ok(())
}

/// Deactivation hides the topic but does not mark it deleted.
pub fn deactivate(state: &mut State, topic_id: TopicId) -> Result<(), CoreError> {
    let topic = state
        .topics
        .get_mut(&topic_id)
        .ok_or(CoreError::TopicNotFound(topic_id))?;
    topic.is_active = false;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::State;

    fn seeded() -> (State, TeacherId, TopicId) {
        let mut state = State::default();
        let teacher = state.register_teacher("Systems Design".into());
        let topic = state.register_topic(teacher, "Sensor fusion", "", BTreeSet::new());
        (state, teacher, topic)
    }

    #[test]
    fn claim_marks_occupied_and_double_claim_fails() {
        let (mut state, _, topic) = seeded();
        claim(&mut state, topic, RequestId(1)).unwrap();
        assert!(state.topics[&topic].is_occupied);
        assert_eq!(state.topics[&topic].occupied_by, Some(RequestId(1)));

        assert!(matches!(
            claim(&mut state, topic, RequestId(2)),
            Err(CoreError::TopicAlreadyOccupied { .. })
        ));
    }

    #[test]
    fn release_clears_the_claim() {
        let (mut state, _, topic) = seeded();
        claim(&mut state, topic, RequestId(1)).unwrap();
        release(&mut state, topic).unwrap();
        assert!(!state.topics[&topic].is_occupied);
        assert_eq!(state.topics[&topic].occupied_by, None);
    }

    #[test]
    fn delete_is_hard_when_unreferenced() {
        let (mut state, _, topic) = seeded();
        assert_eq!(delete(&mut state, topic, false).unwrap(), DeleteOutcome::Hard);
        assert!(!state.topics.contains_key(&topic));
    }

    #[test]
    fn deactivate_does_not_delete() {
        let (mut state, _, topic) = seeded();
        deactivate(&mut state, topic).unwrap();
        assert!(!state.topics[&topic].is_active);
        assert!(!state.topics[&topic].is_deleted);

        activate(&mut state, topic).unwrap();
        assert!(state.topics[&topic].is_active);
    }
}
