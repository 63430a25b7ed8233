//! Audit log entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tripcover_shared::{ActorRole, EventId, EventType, TripId};
use tripcover_store::HistoryEvent;

/// Who is performing an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub role: ActorRole,
    #[serde(default)]
    pub id: Option<String>,
}

impl Actor {
    pub fn new(role: ActorRole, id: Option<String>) -> Self {
        Self { role, id }
    }

    pub fn leader(id: impl Into<String>) -> Self {
        Self::new(ActorRole::Leader, Some(id.into()))
    }

    pub fn admin(id: impl Into<String>) -> Self {
        Self::new(ActorRole::Admin, Some(id.into()))
    }

    pub fn system() -> Self {
        Self::new(ActorRole::System, None)
    }

    /// Display label for the actor, e.g. `ADMIN ops@example.com`.
    pub fn label(&self) -> String {
        match &self.id {
            Some(id) => format!("{} {id}", self.role),
            None => self.role.to_string(),
        }
    }
}

pub(crate) fn new_event(
    trip_id: TripId,
    event_type: EventType,
    actor: &Actor,
    timestamp: DateTime<Utc>,
    notes: String,
) -> HistoryEvent {
    HistoryEvent {
        id: EventId::new(),
        trip_id,
        event_type,
        actor_role: actor.role,
        actor_id: actor.id.clone(),
        timestamp,
        notes,
    }
}

/// Order events oldest first.  The sort is stable, so events sharing a
/// timestamp keep their insertion order.
pub fn chronological(mut events: Vec<HistoryEvent>) -> Vec<HistoryEvent> {
    events.sort_by_key(|e| e.timestamp);
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_chronological_is_stable() {
        let trip = TripId::new();
        let at = Utc::now();
        let a = new_event(trip, EventType::TripCreated, &Actor::system(), at, "a".into());
        let b = new_event(trip, EventType::MemberAdded, &Actor::system(), at, "b".into());
        let early = new_event(
            trip,
            EventType::TripUpdated,
            &Actor::system(),
            at - Duration::seconds(1),
            "early".into(),
        );

        let ordered = chronological(vec![a, b, early]);
        let notes: Vec<_> = ordered.iter().map(|e| e.notes.as_str()).collect();
        assert_eq!(notes, vec!["early", "a", "b"]);
    }

    #[test]
    fn test_actor_label() {
        assert_eq!(Actor::admin("ops").label(), "ADMIN ops");
        assert_eq!(Actor::system().label(), "SYSTEM");
    }
}
