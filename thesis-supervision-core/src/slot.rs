//! Slot ledger: per (teacher, stream) capacity accounting.
//!
//! `occupied` is never incremented in place. It is always recomputed from
//! the set of Active requests referencing the slot, and
//! [`recompute_occupied`] is the single writer of the field.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::request::RequestStatus;
use crate::store::State;
use crate::stream::StreamCode;
use crate::{SlotId, TeacherId};

/// Capacity unit bounding concurrent active supervisions for one
/// (teacher, stream) pair. At most one slot exists per pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Slot {
    pub id: SlotId,
    pub teacher: TeacherId,
    pub stream: StreamCode,
    pub quota: u32,
    pub occupied: u32,
}

impl Slot {
    pub const fn available(&self) -> u32 {
        self.quota.saturating_sub(self.occupied)
    }

    pub const fn has_capacity(&self) -> bool {
        self.occupied < self.quota
    }
}

/// The slot for the pair, if it still has spare capacity.
pub fn find_available<'a>(
    state: &'a State,
    teacher: TeacherId,
    stream: StreamCode,
) -> Option<&'a Slot> {
    state
        .slots
        .values()
        .find(|slot| slot.teacher == teacher && slot.stream == stream && slot.has_capacity())
}

/// Picks the slot a new request will be attached to.
///
/// The capacity check and the reservation are one step: callers run this
/// inside a store transaction, so no other request can race past the check.
pub fn reserve(state: &State, teacher: TeacherId, stream: StreamCode) -> Result<SlotId, CoreError> {
    find_available(state, teacher, stream)
        .map(|slot| slot.id)
        .ok_or(CoreError::NoAvailableSlot {
            teacher,
            stream: stream.to_string(),
        })
}

/// Recounts Active requests referencing the slot and persists the count.
///
/// Called after every transition that can change Active membership. A count
/// above quota aborts the surrounding transaction with `CapacityExceeded`
/// before anything is persisted.
pub fn recompute_occupied(state: &mut State, slot_id: SlotId) -> Result<u32, CoreError> {
    let count = state
        .requests
        .values()
        .filter(|request| request.slot == slot_id && request.status == RequestStatus::Active)
        .count();
    let count = u32::try_from(count).unwrap_or(u32::MAX);

    let slot = state
        .slots
        .get_mut(&slot_id)
        .ok_or(CoreError::SlotNotFound(slot_id))?;
    if count > slot.quota {
        return Err(CoreError::CapacityExceeded {
            slot: slot_id,
            occupied: count,
            quota: slot.quota,
        });
    }
    slot.occupied = count;
    Ok(count)
}
