//! Assignment engine: the many-to-many relation between items and people.

use crate::types::LineItem;

/// Toggle a participant's membership in an item's assignee set.
///
/// Removes the participant if present, adds them otherwise. Unknown item IDs
/// are a silent no-op; the caller treats "nothing changed" as the outcome.
pub fn toggle_assignment(items: &mut [LineItem], item_id: &str, participant_id: &str) {
    let Some(item) = items.iter_mut().find(|i| i.id == item_id) else {
        tracing::debug!(item_id, "toggle on unknown item ignored");
        return;
    };

    if !item.assigned_to.remove(participant_id) {
        item.assigned_to.insert(participant_id.to_string());
    }
}

/// True iff every item has at least one assignee.
///
/// Advisory only: it gates a UI affordance, never the Review transition,
/// and the settlement calculator stays correct on unassigned items.
pub fn is_fully_assigned(items: &[LineItem]) -> bool {
    items.iter().all(|i| !i.assigned_to.is_empty())
}

/// Drop assignments that reference participants no longer in the session.
///
/// Keeps the invariant that assignee sets only contain live participant IDs
/// when a record snapshot is loaded from an older store.
pub fn retain_known_participants(items: &mut [LineItem], participant_ids: &[&str]) {
    for item in items {
        item.assigned_to.retain(|id| participant_ids.contains(&id.as_str()));
    }
}
