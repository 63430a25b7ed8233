//! Claim numbering, patches and freshness flags.
//!
//! Status transitions are unconstrained: an admin may move a claim from any
//! status to any other.  What is constrained is who gets flagged when a claim
//! changes, which [`freshness_delta`] decides from one table.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use tripcover_shared::constants::{CLAIM_NUMBER_PREFIX, CLAIM_SEQ_WIDTH};
use tripcover_shared::{ActorRole, ClaimStatus, MemberId, TripId};
use tripcover_store::Claim;

/// Operations that touch a claim's freshness flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimAction {
    Create,
    Update,
    Note,
    Message,
    Attachment,
    Seen,
}

/// Flag changes produced by one action; `None` leaves a flag untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FreshnessDelta {
    pub admin: Option<bool>,
    pub leader: Option<bool>,
}

impl FreshnessDelta {
    const fn set(admin: Option<bool>, leader: Option<bool>) -> Self {
        Self { admin, leader }
    }

    /// Apply the delta.  Returns `true` if a flag changed.
    pub fn apply(&self, claim: &mut Claim) -> bool {
        let before = (claim.fresh_for_admin, claim.fresh_for_leader);
        if let Some(admin) = self.admin {
            claim.fresh_for_admin = admin;
        }
        if let Some(leader) = self.leader {
            claim.fresh_for_leader = leader;
        }
        before != (claim.fresh_for_admin, claim.fresh_for_leader)
    }
}

/// The (action, role) -> flag transition table.
///
/// Changes are flagged for the side that did not make them.  Notes are
/// admin-only and never reach the leader.  `Seen` clears only the caller's
/// own flag.
pub fn freshness_delta(action: ClaimAction, role: ActorRole) -> FreshnessDelta {
    use ActorRole::{Admin, Leader, System};
    use ClaimAction::*;

    match (action, role) {
        (Create, Leader) => FreshnessDelta::set(Some(true), Some(false)),
        (Create, Admin) => FreshnessDelta::set(Some(true), Some(true)),
        (Create, System) => FreshnessDelta::set(Some(true), Some(false)),

        (Update | Message | Attachment, Admin) => FreshnessDelta::set(Some(false), Some(true)),
        (Update | Message | Attachment, Leader) => FreshnessDelta::set(Some(true), Some(false)),
        (Update | Message | Attachment, System) => FreshnessDelta::set(Some(true), Some(true)),

        (Note, Admin) => FreshnessDelta::set(Some(false), None),
        (Note, System) => FreshnessDelta::set(Some(true), None),
        (Note, Leader) => FreshnessDelta::default(),

        (Seen, Admin) => FreshnessDelta::set(Some(false), None),
        (Seen, Leader) => FreshnessDelta::set(None, Some(false)),
        (Seen, System) => FreshnessDelta::default(),
    }
}

/// `CLM-<tripShort>-<year>-<seq>`, e.g. `CLM-3F2A9C-2025-00001`.
pub fn claim_number(trip_id: TripId, year: i32, seq: u32) -> String {
    format!(
        "{}-{}-{}-{:0width$}",
        CLAIM_NUMBER_PREFIX,
        trip_id.short(),
        year,
        seq,
        width = CLAIM_SEQ_WIDTH
    )
}

/// Next sequence number for `trip_id` in `year`: one past the highest
/// sequence already issued, so numbers stay unique and increasing.
pub fn next_claim_sequence(existing: &[Claim], trip_id: TripId, year: i32) -> u32 {
    let prefix = format!("{}-{}-{}-", CLAIM_NUMBER_PREFIX, trip_id.short(), year);
    existing
        .iter()
        .filter(|c| c.trip_id == trip_id)
        .filter_map(|c| c.claim_number.strip_prefix(&prefix))
        .filter_map(|seq| seq.parse::<u32>().ok())
        .max()
        .unwrap_or(0)
        + 1
}

/// Input for filing a claim.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewClaim {
    pub trip_id: Option<TripId>,
    #[serde(default)]
    pub member_id: Option<MemberId>,
    #[serde(default)]
    pub member_name: Option<String>,
    #[serde(default)]
    pub member_email: Option<String>,
    #[serde(default)]
    pub member_phone: Option<String>,
    #[serde(default)]
    pub reporter_name: Option<String>,
    #[serde(default)]
    pub reporter_email: Option<String>,
    #[serde(default)]
    pub incident_type: Option<String>,
    #[serde(default)]
    pub incident_date: Option<NaiveDate>,
    #[serde(default)]
    pub incident_location: Option<String>,
    #[serde(default)]
    pub incident_description: String,
}

/// Partial update of a claim.  `None` fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClaimPatch {
    #[serde(default)]
    pub status: Option<ClaimStatus>,
    #[serde(default)]
    pub incident_type: Option<String>,
    #[serde(default)]
    pub incident_date: Option<NaiveDate>,
    #[serde(default)]
    pub incident_location: Option<String>,
    #[serde(default)]
    pub incident_description: Option<String>,
    #[serde(default)]
    pub member_name: Option<String>,
    #[serde(default)]
    pub member_email: Option<String>,
    #[serde(default)]
    pub member_phone: Option<String>,
}

impl ClaimPatch {
    pub fn status(status: ClaimStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Merge into `claim`.  Returns the previous status if it changed.
    pub fn apply(&self, claim: &mut Claim) -> Option<ClaimStatus> {
        if let Some(v) = &self.incident_type {
            claim.incident_type = Some(v.clone());
        }
        if let Some(v) = self.incident_date {
            claim.incident_date = Some(v);
        }
        if let Some(v) = &self.incident_location {
            claim.incident_location = Some(v.clone());
        }
        if let Some(v) = &self.incident_description {
            claim.incident_description = v.clone();
        }
        if let Some(v) = &self.member_name {
            claim.member_name = Some(v.clone());
        }
        if let Some(v) = &self.member_email {
            claim.member_email = Some(v.clone());
        }
        if let Some(v) = &self.member_phone {
            claim.member_phone = Some(v.clone());
        }

        match self.status {
            Some(status) if status != claim.status => {
                let previous = claim.status;
                claim.status = status;
                Some(previous)
            }
            _ => None,
        }
    }
}

/// Input for attaching a file reference to a claim.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewAttachment {
    pub file_name: String,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub size_bytes: Option<u64>,
    #[serde(default)]
    pub url: Option<String>,
}
