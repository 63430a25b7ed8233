use chrono::Datelike;
use tracing::{debug, info, warn};
use uuid::Uuid;

use tripcover_shared::{ActorRole, ClaimId, ClaimStatus, EventType, TripId};
use tripcover_store::{Claim, ClaimAttachment, ClaimMessage, ClaimNote, RecordStore};

use super::{load_trip, Tx, TripDesk};
use crate::claims::{
    claim_number, freshness_delta, next_claim_sequence, ClaimAction, ClaimPatch, NewAttachment,
    NewClaim,
};
use crate::error::{CoreError, Result};
use crate::history::Actor;

fn non_empty(value: &str, what: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(CoreError::validation(format!("{what} is required")));
    }
    Ok(value.to_string())
}

impl<S: RecordStore> Tx<'_, S> {
    fn claim(&self, claim_id: ClaimId) -> Result<Claim> {
        self.store
            .by_id::<Claim>(claim_id.0)?
            .ok_or_else(|| CoreError::not_found("claim", claim_id))
    }

    /// Apply `action`'s freshness delta, stamp and store the claim.
    fn touch_claim(&mut self, claim: &mut Claim, action: ClaimAction, role: ActorRole) -> Result<()> {
        freshness_delta(action, role).apply(claim);
        claim.updated_at = self.now;
        self.store.put(&*claim)?;
        Ok(())
    }
}

impl<S: RecordStore> TripDesk<S> {
    /// File a claim.  Archived trips still accept claims.
    pub fn create_claim(&mut self, new: NewClaim, actor: &Actor) -> Result<Claim> {
        let trip_id = new
            .trip_id
            .ok_or_else(|| CoreError::validation("trip id is required"))?;
        let description = non_empty(&new.incident_description, "incident description")?;

        let claim = self.atomically(|tx| {
            tx.trip(trip_id)?;
            let member = match new.member_id {
                Some(member_id) => Some(tx.member(trip_id, member_id)?),
                None => None,
            };

            let year = tx.now.year();
            let existing = tx.store.for_trip::<Claim>(trip_id.0)?;
            let seq = next_claim_sequence(&existing, trip_id, year);

            let reporter_name = new
                .reporter_name
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string)
                .or_else(|| actor.id.clone())
                .unwrap_or_else(|| actor.role.to_string());

            let mut claim = Claim {
                id: ClaimId::new(),
                claim_number: claim_number(trip_id, year, seq),
                trip_id,
                member_id: member.as_ref().map(|m| m.id),
                member_name: new
                    .member_name
                    .clone()
                    .or_else(|| member.as_ref().map(|m| m.full_name())),
                member_email: new
                    .member_email
                    .clone()
                    .or_else(|| member.as_ref().and_then(|m| m.email.clone())),
                member_phone: new
                    .member_phone
                    .clone()
                    .or_else(|| member.as_ref().and_then(|m| m.phone.clone())),
                reporter_name,
                reporter_email: new.reporter_email.clone(),
                reporter_role: actor.role,
                status: ClaimStatus::Submitted,
                incident_type: new.incident_type.clone(),
                incident_date: new.incident_date,
                incident_location: new.incident_location.clone(),
                incident_description: description,
                attachments: Vec::new(),
                messages: Vec::new(),
                notes: Vec::new(),
                fresh_for_admin: false,
                fresh_for_leader: false,
                created_at: tx.now,
                updated_at: tx.now,
            };
            freshness_delta(ClaimAction::Create, actor.role).apply(&mut claim);
            tx.store.insert(&claim)?;

            let event_type = if actor.role == ActorRole::Leader {
                EventType::ClaimSubmitted
            } else {
                EventType::ClaimCreated
            };
            let about = claim
                .member_name
                .as_deref()
                .map(|n| format!(" for {n}"))
                .unwrap_or_default();
            tx.log(
                trip_id,
                event_type,
                actor,
                format!("Claim {} filed{about}", claim.claim_number),
            )?;
            Ok(claim)
        })?;

        info!(claim_id = %claim.id, number = %claim.claim_number, trip_id = %trip_id, "Claim created");
        Ok(claim)
    }

    /// Merge `patch` into a claim.  Only a status change is logged.
    pub fn update_claim(&mut self, claim_id: ClaimId, patch: ClaimPatch, actor: &Actor) -> Result<Claim> {
        if let Some(description) = &patch.incident_description {
            non_empty(description, "incident description")?;
        }

        self.atomically(|tx| {
            let mut claim = tx.claim(claim_id)?;
            let previous = patch.apply(&mut claim);
            tx.touch_claim(&mut claim, ClaimAction::Update, actor.role)?;

            if let Some(previous) = previous {
                tx.log(
                    claim.trip_id,
                    EventType::ClaimStatusUpdated,
                    actor,
                    format!(
                        "Claim {} status changed from {previous} to {}",
                        claim.claim_number, claim.status
                    ),
                )?;
                info!(claim_id = %claim_id, %previous, status = %claim.status, "Claim status updated");
            } else {
                debug!(claim_id = %claim_id, "Claim details updated");
            }
            Ok(claim)
        })
    }

    /// Add an internal note.  Notes are admin-only.
    pub fn add_claim_note(&mut self, claim_id: ClaimId, body: &str, actor: &Actor) -> Result<Claim> {
        if actor.role == ActorRole::Leader {
            warn!(claim_id = %claim_id, "Leader attempted to add an internal note");
            return Err(CoreError::validation("claim notes are admin-only"));
        }
        let body = non_empty(body, "note")?;

        self.atomically(|tx| {
            let mut claim = tx.claim(claim_id)?;
            claim.notes.insert(
                0,
                ClaimNote {
                    id: Uuid::new_v4(),
                    author_id: actor.id.clone(),
                    body,
                    created_at: tx.now,
                },
            );
            tx.touch_claim(&mut claim, ClaimAction::Note, actor.role)?;
            tx.log(
                claim.trip_id,
                EventType::ClaimNoteAdded,
                actor,
                format!("Internal note added to claim {}", claim.claim_number),
            )?;
            info!(claim_id = %claim_id, "Claim note added");
            Ok(claim)
        })
    }

    /// Add a message visible to both sides; flags the other side.
    pub fn add_claim_message(
        &mut self,
        claim_id: ClaimId,
        body: &str,
        author_name: Option<&str>,
        actor: &Actor,
    ) -> Result<Claim> {
        let body = non_empty(body, "message")?;

        self.atomically(|tx| {
            let mut claim = tx.claim(claim_id)?;
            claim.messages.insert(
                0,
                ClaimMessage {
                    id: Uuid::new_v4(),
                    author_role: actor.role,
                    author_name: author_name
                        .map(str::to_string)
                        .or_else(|| actor.id.clone()),
                    body,
                    created_at: tx.now,
                },
            );
            tx.touch_claim(&mut claim, ClaimAction::Message, actor.role)?;
            tx.log(
                claim.trip_id,
                EventType::ClaimMessageAdded,
                actor,
                format!("{} message on claim {}", actor.role, claim.claim_number),
            )?;
            info!(claim_id = %claim_id, role = %actor.role, "Claim message added");
            Ok(claim)
        })
    }

    pub fn add_claim_attachment(
        &mut self,
        claim_id: ClaimId,
        attachment: NewAttachment,
        actor: &Actor,
    ) -> Result<Claim> {
        let file_name = non_empty(&attachment.file_name, "file name")?;

        self.atomically(|tx| {
            let mut claim = tx.claim(claim_id)?;
            claim.attachments.insert(
                0,
                ClaimAttachment {
                    id: Uuid::new_v4(),
                    file_name: file_name.clone(),
                    content_type: attachment.content_type.clone(),
                    size_bytes: attachment.size_bytes,
                    url: attachment.url.clone(),
                    uploaded_by: actor.role,
                    created_at: tx.now,
                },
            );
            tx.touch_claim(&mut claim, ClaimAction::Attachment, actor.role)?;
            tx.log(
                claim.trip_id,
                EventType::ClaimAttachmentAdded,
                actor,
                format!("Attachment {file_name} added to claim {}", claim.claim_number),
            )?;
            info!(claim_id = %claim_id, file = %file_name, "Claim attachment added");
            Ok(claim)
        })
    }

    /// Clear the caller's freshness flag.  Not an auditable change.
    pub fn mark_claim_seen(&mut self, claim_id: ClaimId, role: ActorRole) -> Result<Claim> {
        self.atomically(|tx| {
            let mut claim = tx.claim(claim_id)?;
            if freshness_delta(ClaimAction::Seen, role).apply(&mut claim) {
                tx.store.put(&claim)?;
            }
            Ok(claim)
        })
    }

    pub fn get_claim(&self, claim_id: ClaimId) -> Result<Claim> {
        self.store
            .by_id::<Claim>(claim_id.0)?
            .ok_or_else(|| CoreError::not_found("claim", claim_id))
    }

    /// Claims in filing order, optionally for one trip.
    pub fn list_claims(&self, trip_id: Option<TripId>) -> Result<Vec<Claim>> {
        match trip_id {
            Some(trip_id) => {
                load_trip(&self.store, trip_id)?;
                Ok(self.store.for_trip::<Claim>(trip_id.0)?)
            }
            None => Ok(self.store.all::<Claim>()?),
        }
    }

    /// Claims with something `role` has not seen yet.
    pub fn unseen_claims(&self, role: ActorRole) -> Result<Vec<Claim>> {
        Ok(self.store.filter(|c: &Claim| match role {
            ActorRole::Admin => c.fresh_for_admin,
            ActorRole::Leader => c.fresh_for_leader,
            ActorRole::System => false,
        })?)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;
    use tripcover_shared::TripStatus;

    fn file(desk: &mut crate::TripDesk<tripcover_store::MemoryStore>, trip: TripId, actor: &Actor) -> Claim {
        desk.create_claim(
            NewClaim {
                trip_id: Some(trip),
                incident_description: "Lost luggage".into(),
                ..NewClaim::default()
            },
            actor,
        )
        .unwrap()
    }

    #[test]
    fn test_leader_claim_is_submitted_and_flags_admin() {
        let mut desk = desk();
        let trip = june_trip(&mut desk);
        let ann = adult(&mut desk, &trip, "Ann", "Able");

        let claim = desk
            .create_claim(
                NewClaim {
                    trip_id: Some(trip.id),
                    member_id: Some(ann.id),
                    incident_description: "Twisted ankle".into(),
                    ..NewClaim::default()
                },
                &leader(),
            )
            .unwrap();

        assert_eq!(
            claim.claim_number,
            format!("CLM-{}-2025-00001", trip.id.short())
        );
        assert_eq!(claim.status, ClaimStatus::Submitted);
        assert_eq!(claim.member_name.as_deref(), Some("Ann Able"));
        assert_eq!(claim.reporter_name, "leader-1");
        assert!(claim.fresh_for_admin);
        assert!(!claim.fresh_for_leader);

        let last = desk.history(trip.id).unwrap().pop().unwrap();
        assert_eq!(last.event_type, EventType::ClaimSubmitted);
        assert_eq!(
            last.notes,
            format!("Claim {} filed for Ann Able", claim.claim_number)
        );
    }

    #[test]
    fn test_admin_claim_is_created() {
        let mut desk = desk();
        let trip = june_trip(&mut desk);
        let claim = file(&mut desk, trip.id, &admin());
        assert!(claim.fresh_for_leader && claim.fresh_for_admin);
        assert_eq!(
            event_types(&desk, &trip).last(),
            Some(&EventType::ClaimCreated)
        );
    }

    #[test]
    fn test_claim_requires_trip_and_description() {
        let mut desk = desk();
        let trip = june_trip(&mut desk);

        let no_trip = desk.create_claim(
            NewClaim {
                incident_description: "x".into(),
                ..NewClaim::default()
            },
            &leader(),
        );
        assert!(matches!(no_trip, Err(CoreError::Validation(_))));

        let no_text = desk.create_claim(
            NewClaim {
                trip_id: Some(trip.id),
                incident_description: "   ".into(),
                ..NewClaim::default()
            },
            &leader(),
        );
        assert!(matches!(no_text, Err(CoreError::Validation(_))));

        let missing_trip = desk.create_claim(
            NewClaim {
                trip_id: Some(TripId::new()),
                incident_description: "x".into(),
                ..NewClaim::default()
            },
            &leader(),
        );
        assert!(missing_trip.unwrap_err().is_not_found());
        assert!(desk.list_claims(None).unwrap().is_empty());
    }

    #[test]
    fn test_claim_numbers_increase_per_trip() {
        let mut desk = desk();
        let trip = june_trip(&mut desk);
        let numbers: Vec<String> = (0..3)
            .map(|_| file(&mut desk, trip.id, &leader()).claim_number)
            .collect();

        let suffixes: Vec<&str> = numbers.iter().map(|n| &n[n.len() - 5..]).collect();
        assert_eq!(suffixes, vec!["00001", "00002", "00003"]);

        let other = june_trip(&mut desk);
        assert!(file(&mut desk, other.id, &leader())
            .claim_number
            .ends_with("-2025-00001"));
    }

    #[test]
    fn test_status_update_flags_leader_and_logs_once() {
        let mut desk = desk();
        let trip = june_trip(&mut desk);
        let claim = file(&mut desk, trip.id, &leader());

        let claim = desk
            .update_claim(claim.id, ClaimPatch::status(ClaimStatus::InReview), &admin())
            .unwrap();
        assert!(claim.fresh_for_leader);
        assert!(!claim.fresh_for_admin);

        desk.update_claim(claim.id, ClaimPatch::status(ClaimStatus::InReview), &admin())
            .unwrap();
        let updates = event_types(&desk, &trip)
            .into_iter()
            .filter(|e| *e == EventType::ClaimStatusUpdated)
            .count();
        assert_eq!(updates, 1);
    }

    #[test]
    fn test_notes_stay_admin_side() {
        let mut desk = desk();
        let trip = june_trip(&mut desk);
        let claim = file(&mut desk, trip.id, &leader());

        let err = desk
            .add_claim_note(claim.id, "peek", &leader())
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));

        desk.add_claim_note(claim.id, "first", &admin()).unwrap();
        let claim = desk.add_claim_note(claim.id, "second", &admin()).unwrap();
        assert_eq!(claim.notes[0].body, "second");
        assert!(!claim.fresh_for_leader);
        assert!(!claim.fresh_for_admin);

        let last = desk.history(trip.id).unwrap().pop().unwrap();
        assert_eq!(last.event_type, EventType::ClaimNoteAdded);
        assert!(!last.notes.contains("second"));
    }

    #[test]
    fn test_messages_and_attachments_flag_other_side() {
        let mut desk = desk();
        let trip = june_trip(&mut desk);
        let claim = file(&mut desk, trip.id, &leader());

        let claim = desk
            .add_claim_message(claim.id, "Need the receipt", None, &admin())
            .unwrap();
        assert!(claim.fresh_for_leader);
        assert_eq!(claim.messages[0].author_name.as_deref(), Some("ops"));

        let claim = desk
            .add_claim_attachment(
                claim.id,
                NewAttachment {
                    file_name: "receipt.pdf".into(),
                    content_type: Some("application/pdf".into()),
                    ..NewAttachment::default()
                },
                &leader(),
            )
            .unwrap();
        assert!(claim.fresh_for_admin);
        assert!(!claim.fresh_for_leader);
        assert_eq!(claim.attachments[0].uploaded_by, ActorRole::Leader);
    }

    #[test]
    fn test_seen_clears_one_flag_without_event() {
        let mut desk = desk();
        let trip = june_trip(&mut desk);
        let claim = file(&mut desk, trip.id, &admin());
        let events = event_types(&desk, &trip);

        assert_eq!(desk.unseen_claims(ActorRole::Leader).unwrap().len(), 1);
        let claim = desk.mark_claim_seen(claim.id, ActorRole::Leader).unwrap();
        assert!(!claim.fresh_for_leader);
        assert!(claim.fresh_for_admin);
        assert!(desk.unseen_claims(ActorRole::Leader).unwrap().is_empty());
        assert_eq!(event_types(&desk, &trip), events);
    }

    #[test]
    fn test_missing_claim_is_not_found() {
        let mut desk = desk();
        let err = desk
            .update_claim(ClaimId::new(), ClaimPatch::default(), &admin())
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(desk
            .mark_claim_seen(ClaimId::new(), ActorRole::Admin)
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn test_archived_trip_accepts_claims() {
        let mut desk = desk();
        let trip = june_trip(&mut desk);
        desk.set_trip_status(trip.id, TripStatus::Archived, &admin())
            .unwrap();
        let claim = file(&mut desk, trip.id, &leader());
        assert_eq!(desk.list_claims(Some(trip.id)).unwrap(), vec![claim]);
    }
}
