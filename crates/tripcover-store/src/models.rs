//! Domain model structs persisted in the record store.
//!
//! Every struct derives `Serialize` and `Deserialize` so it can be handed
//! directly to the HTTP layer.  Rows are always written in the canonical
//! snake_case shape; the `alias` attributes let older camelCase rows and the
//! `member_id` spelling of a member's id load into the same struct.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use tripcover_shared::{
    ActorRole, ClaimId, ClaimStatus, EntryId, EntryKind, EventId, EventType, MemberId,
    PaymentStatus, RateId, Region, TripId, TripStatus,
};

use crate::record::{Collection, Record};

fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Trip
// ---------------------------------------------------------------------------

/// A trip whose travelers are insured for every day from `start_date` to
/// `end_date`, both inclusive.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Trip {
    pub id: TripId,
    /// Account reference of the leader who owns the trip.
    #[serde(default, alias = "leaderId")]
    pub leader_id: Option<String>,
    pub title: String,
    #[serde(alias = "startDate")]
    pub start_date: NaiveDate,
    #[serde(alias = "endDate")]
    pub end_date: NaiveDate,
    pub region: Region,
    /// Per-person-per-day rate, snapshotted when the trip is created or edited.
    #[serde(alias = "rateCents")]
    pub rate_cents: i64,
    pub status: TripStatus,
    #[serde(alias = "paymentStatus")]
    pub payment_status: PaymentStatus,
    /// Cached ledger balance.  The ledger itself is authoritative.
    #[serde(default, alias = "creditsTotalCents")]
    pub credits_total_cents: i64,
    #[serde(alias = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(alias = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl Trip {
    pub fn is_archived(&self) -> bool {
        self.status == TripStatus::Archived
    }
}

impl Record for Trip {
    const COLLECTION: Collection = Collection::Trips;

    fn record_id(&self) -> Uuid {
        self.id.0
    }
}

// ---------------------------------------------------------------------------
// Member
// ---------------------------------------------------------------------------

/// A traveler on a trip roster.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Member {
    #[serde(alias = "member_id", alias = "memberId")]
    pub id: MemberId,
    #[serde(alias = "tripId")]
    pub trip_id: TripId,
    #[serde(alias = "firstName")]
    pub first_name: String,
    #[serde(alias = "lastName")]
    pub last_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default, alias = "isMinor")]
    pub is_minor: bool,
    /// Adult consent.
    #[serde(default)]
    pub confirmed: bool,
    #[serde(default, alias = "confirmedAt")]
    pub confirmed_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "guardianApproved")]
    pub guardian_approved: bool,
    #[serde(default, alias = "guardianApprovedAt")]
    pub guardian_approved_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "guardianName")]
    pub guardian_name: Option<String>,
    #[serde(default, alias = "guardianEmail")]
    pub guardian_email: Option<String>,
    #[serde(default, alias = "guardianPhone")]
    pub guardian_phone: Option<String>,
    /// `false` puts the member on standby: kept on the roster, never seated.
    #[serde(default = "default_true")]
    pub active: bool,
    /// When the member last entered the covered set.
    #[serde(default, alias = "coverageAsOf")]
    pub coverage_as_of: Option<DateTime<Utc>>,
    /// Seat-order override inherited through a coverage transfer.
    #[serde(default, alias = "seatPriorityAt")]
    pub seat_priority_at: Option<DateTime<Utc>>,
    #[serde(alias = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl Member {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
            .trim()
            .to_string()
    }

    /// Consent is complete: confirmed, and guardian-approved if a minor.
    pub fn has_consent(&self) -> bool {
        self.confirmed && (!self.is_minor || self.guardian_approved)
    }

    /// Candidate for a seat: active with complete consent.
    pub fn is_eligible(&self) -> bool {
        self.active && self.has_consent()
    }

    /// Timestamp that positions the member in the seat queue.
    pub fn seat_key(&self) -> Option<DateTime<Utc>> {
        self.seat_priority_at.or(self.confirmed_at)
    }
}

impl Record for Member {
    const COLLECTION: Collection = Collection::Members;

    fn record_id(&self) -> Uuid {
        self.id.0
    }

    fn trip_ref(&self) -> Option<Uuid> {
        Some(self.trip_id.0)
    }
}

// ---------------------------------------------------------------------------
// Ledger entry
// ---------------------------------------------------------------------------

/// One append-only payment, credit or refund against a trip.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerEntry {
    pub id: EntryId,
    #[serde(alias = "tripId")]
    pub trip_id: TripId,
    /// Always positive; the direction is carried by `kind`.
    #[serde(alias = "amountCents")]
    pub amount_cents: i64,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default, alias = "providerRef")]
    pub provider_ref: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(alias = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Contribution of this entry to the trip balance.
    pub fn signed_cents(&self) -> i64 {
        if self.kind.adds_to_balance() {
            self.amount_cents
        } else {
            -self.amount_cents
        }
    }
}

impl Record for LedgerEntry {
    const COLLECTION: Collection = Collection::Payments;

    fn record_id(&self) -> Uuid {
        self.id.0
    }

    fn trip_ref(&self) -> Option<Uuid> {
        Some(self.trip_id.0)
    }
}

// ---------------------------------------------------------------------------
// History event
// ---------------------------------------------------------------------------

/// Append-only audit entry for a state-changing action on a trip.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryEvent {
    pub id: EventId,
    #[serde(alias = "tripId")]
    pub trip_id: TripId,
    #[serde(rename = "type")]
    pub event_type: EventType,
    #[serde(alias = "actorRole")]
    pub actor_role: ActorRole,
    #[serde(default, alias = "actorId")]
    pub actor_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub notes: String,
}

impl Record for HistoryEvent {
    const COLLECTION: Collection = Collection::History;

    fn record_id(&self) -> Uuid {
        self.id.0
    }

    fn trip_ref(&self) -> Option<Uuid> {
        Some(self.trip_id.0)
    }
}

// ---------------------------------------------------------------------------
// Claim
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClaimMessage {
    pub id: Uuid,
    #[serde(alias = "authorRole")]
    pub author_role: ActorRole,
    #[serde(default, alias = "authorName")]
    pub author_name: Option<String>,
    pub body: String,
    #[serde(alias = "createdAt")]
    pub created_at: DateTime<Utc>,
}

/// Internal note, visible to admins only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClaimNote {
    pub id: Uuid,
    #[serde(default, alias = "authorId")]
    pub author_id: Option<String>,
    pub body: String,
    #[serde(alias = "createdAt")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClaimAttachment {
    pub id: Uuid,
    #[serde(alias = "fileName")]
    pub file_name: String,
    #[serde(default, alias = "contentType")]
    pub content_type: Option<String>,
    #[serde(default, alias = "sizeBytes")]
    pub size_bytes: Option<u64>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(alias = "uploadedBy")]
    pub uploaded_by: ActorRole,
    #[serde(alias = "createdAt")]
    pub created_at: DateTime<Utc>,
}

/// An insurance claim filed against a trip.
///
/// `messages`, `notes` and `attachments` are kept newest first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claim {
    pub id: ClaimId,
    #[serde(alias = "claimNumber")]
    pub claim_number: String,
    #[serde(alias = "tripId")]
    pub trip_id: TripId,
    #[serde(default, alias = "memberId")]
    pub member_id: Option<MemberId>,
    #[serde(default, alias = "memberName")]
    pub member_name: Option<String>,
    #[serde(default, alias = "memberEmail")]
    pub member_email: Option<String>,
    #[serde(default, alias = "memberPhone")]
    pub member_phone: Option<String>,
    #[serde(alias = "reporterName")]
    pub reporter_name: String,
    #[serde(default, alias = "reporterEmail")]
    pub reporter_email: Option<String>,
    #[serde(alias = "reporterRole")]
    pub reporter_role: ActorRole,
    pub status: ClaimStatus,
    #[serde(default, alias = "incidentType")]
    pub incident_type: Option<String>,
    #[serde(default, alias = "incidentDate")]
    pub incident_date: Option<NaiveDate>,
    #[serde(default, alias = "incidentLocation")]
    pub incident_location: Option<String>,
    #[serde(alias = "incidentDescription")]
    pub incident_description: String,
    #[serde(default)]
    pub attachments: Vec<ClaimAttachment>,
    #[serde(default)]
    pub messages: Vec<ClaimMessage>,
    #[serde(default)]
    pub notes: Vec<ClaimNote>,
    #[serde(default, alias = "freshForAdmin")]
    pub fresh_for_admin: bool,
    #[serde(default, alias = "freshForLeader")]
    pub fresh_for_leader: bool,
    #[serde(alias = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(alias = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl Record for Claim {
    const COLLECTION: Collection = Collection::Claims;

    fn record_id(&self) -> Uuid {
        self.id.0
    }

    fn trip_ref(&self) -> Option<Uuid> {
        Some(self.trip_id.0)
    }
}

// ---------------------------------------------------------------------------
// Rate
// ---------------------------------------------------------------------------

/// Current per-person-per-day price for a region.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Rate {
    pub id: RateId,
    pub region: Region,
    #[serde(alias = "rateCents")]
    pub rate_cents: i64,
    #[serde(alias = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl Record for Rate {
    const COLLECTION: Collection = Collection::Rates;

    fn record_id(&self) -> Uuid {
        self.id.0
    }
}
