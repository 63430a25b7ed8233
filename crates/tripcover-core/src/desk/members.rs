use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use tripcover_shared::{EventType, MemberId, TripId};
use tripcover_store::{Member, RecordStore};

use super::{load_member, roster, TripDesk};
use crate::error::{CoreError, Result};
use crate::history::Actor;

/// Input for adding a traveler to a trip.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewMember {
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub is_minor: bool,
    #[serde(default)]
    pub confirmed: bool,
    #[serde(default)]
    pub guardian_approved: bool,
    #[serde(default)]
    pub guardian_name: Option<String>,
    #[serde(default)]
    pub guardian_email: Option<String>,
    #[serde(default)]
    pub guardian_phone: Option<String>,
}

/// Partial update of a member.  `None` fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemberPatch {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub is_minor: Option<bool>,
    #[serde(default)]
    pub confirmed: Option<bool>,
    #[serde(default)]
    pub guardian_approved: Option<bool>,
    #[serde(default)]
    pub guardian_name: Option<String>,
    #[serde(default)]
    pub guardian_email: Option<String>,
    #[serde(default)]
    pub guardian_phone: Option<String>,
    /// `false` moves the member to standby.
    #[serde(default)]
    pub active: Option<bool>,
}

fn required_name(value: &str, field: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(CoreError::validation(format!("{field} is required")));
    }
    Ok(value.to_string())
}

/// Set consent flags and keep their timestamps in step.
fn set_confirmed(member: &mut Member, confirmed: bool, now: DateTime<Utc>) {
    if confirmed && !member.confirmed {
        member.confirmed_at = Some(now);
    } else if !confirmed {
        member.confirmed_at = None;
    }
    member.confirmed = confirmed;
}

fn set_guardian_approved(member: &mut Member, approved: bool, now: DateTime<Utc>) {
    if approved && !member.guardian_approved {
        member.guardian_approved_at = Some(now);
    } else if !approved {
        member.guardian_approved_at = None;
    }
    member.guardian_approved = approved;
}

/// A member who drops out of the queue loses any inherited seat position.
fn drop_inherited_priority(member: &mut Member) {
    if !member.is_eligible() {
        member.seat_priority_at = None;
    }
}

impl MemberPatch {
    fn apply(&self, member: &mut Member, now: DateTime<Utc>) -> Result<()> {
        if let Some(v) = &self.first_name {
            member.first_name = required_name(v, "first name")?;
        }
        if let Some(v) = &self.last_name {
            member.last_name = required_name(v, "last name")?;
        }
        if let Some(v) = &self.email {
            member.email = Some(v.clone());
        }
        if let Some(v) = &self.phone {
            member.phone = Some(v.clone());
        }
        if let Some(v) = self.is_minor {
            member.is_minor = v;
        }
        if let Some(v) = self.confirmed {
            set_confirmed(member, v, now);
        }
        if let Some(v) = self.guardian_approved {
            set_guardian_approved(member, v, now);
        }
        if let Some(v) = &self.guardian_name {
            member.guardian_name = Some(v.clone());
        }
        if let Some(v) = &self.guardian_email {
            member.guardian_email = Some(v.clone());
        }
        if let Some(v) = &self.guardian_phone {
            member.guardian_phone = Some(v.clone());
        }
        if let Some(v) = self.active {
            member.active = v;
        }
        drop_inherited_priority(member);
        Ok(())
    }
}

impl<S: RecordStore> TripDesk<S> {
    pub fn add_member(&mut self, trip_id: TripId, new: NewMember, actor: &Actor) -> Result<Member> {
        let first_name = required_name(&new.first_name, "first name")?;
        let last_name = required_name(&new.last_name, "last name")?;

        self.atomically(|tx| {
            tx.editable_trip(trip_id)?;
            let mut member = Member {
                id: MemberId::new(),
                trip_id,
                first_name,
                last_name,
                email: new.email.clone(),
                phone: new.phone.clone(),
                is_minor: new.is_minor,
                confirmed: false,
                confirmed_at: None,
                guardian_approved: false,
                guardian_approved_at: None,
                guardian_name: new.guardian_name.clone(),
                guardian_email: new.guardian_email.clone(),
                guardian_phone: new.guardian_phone.clone(),
                active: true,
                coverage_as_of: None,
                seat_priority_at: None,
                created_at: tx.now,
            };
            set_confirmed(&mut member, new.confirmed, tx.now);
            set_guardian_approved(&mut member, new.guardian_approved, tx.now);
            tx.store.insert(&member)?;

            let recon = tx.reconcile(trip_id)?;
            tx.log(
                trip_id,
                EventType::MemberAdded,
                actor,
                recon.notes(format!("Added {}", member.full_name())),
            )?;
            info!(trip_id = %trip_id, member_id = %member.id, "Member added");
            tx.member(trip_id, member.id)
        })
    }

    pub fn update_member(
        &mut self,
        trip_id: TripId,
        member_id: MemberId,
        patch: MemberPatch,
        actor: &Actor,
    ) -> Result<Member> {
        self.atomically(|tx| {
            tx.editable_trip(trip_id)?;
            let mut member = tx.member(trip_id, member_id)?;
            let before = member.clone();
            patch.apply(&mut member, tx.now)?;
            if member == before {
                return Ok(member);
            }
            tx.store.put(&member)?;

            let recon = tx.reconcile(trip_id)?;
            tx.log(
                trip_id,
                EventType::MemberUpdated,
                actor,
                recon.notes(format!("Updated {}", member.full_name())),
            )?;
            info!(trip_id = %trip_id, member_id = %member_id, "Member updated");
            tx.member(trip_id, member_id)
        })
    }

    /// Record adult consent.
    pub fn confirm_member(
        &mut self,
        trip_id: TripId,
        member_id: MemberId,
        actor: &Actor,
    ) -> Result<Member> {
        let patch = MemberPatch {
            confirmed: Some(true),
            ..MemberPatch::default()
        };
        self.update_member(trip_id, member_id, patch, actor)
    }

    /// Record guardian approval for a minor.
    pub fn approve_guardian(
        &mut self,
        trip_id: TripId,
        member_id: MemberId,
        actor: &Actor,
    ) -> Result<Member> {
        let patch = MemberPatch {
            guardian_approved: Some(true),
            ..MemberPatch::default()
        };
        self.update_member(trip_id, member_id, patch, actor)
    }

    /// Delete a member outright.  A seat they held goes back to the queue.
    pub fn remove_member(&mut self, trip_id: TripId, member_id: MemberId, actor: &Actor) -> Result<()> {
        self.atomically(|tx| {
            tx.editable_trip(trip_id)?;
            let member = tx.member(trip_id, member_id)?;
            tx.store.remove::<Member>(member_id.0)?;

            let recon = tx.reconcile(trip_id)?;
            tx.log(
                trip_id,
                EventType::MemberRemoved,
                actor,
                recon.notes(format!("Removed {}", member.full_name())),
            )?;
            info!(trip_id = %trip_id, member_id = %member_id, "Member removed");
            Ok(())
        })
    }

    pub fn get_member(&self, trip_id: TripId, member_id: MemberId) -> Result<Member> {
        load_member(&self.store, trip_id, member_id)
    }

    /// Roster of a trip in the order members were added.
    pub fn list_members(&self, trip_id: TripId) -> Result<Vec<Member>> {
        super::load_trip(&self.store, trip_id)?;
        roster(&self.store, trip_id)
    }
}
