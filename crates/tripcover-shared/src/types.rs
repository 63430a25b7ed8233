use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::CLAIM_TRIP_SHORT_LEN;
use crate::error::ParseEnumError;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord,
        )]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s.trim()).map(Self)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

uuid_id!(
    /// Identifier of a trip.
    TripId
);
uuid_id!(
    /// Identifier of a traveler on a trip roster.
    MemberId
);
uuid_id!(
    /// Identifier of a ledger entry.
    EntryId
);
uuid_id!(
    /// Identifier of a history event.
    EventId
);
uuid_id!(
    /// Identifier of an insurance claim.
    ClaimId
);
uuid_id!(
    /// Identifier of a rate record.
    RateId
);

impl TripId {
    /// Short uppercase prefix embedded in claim numbers, e.g. `3F2A9C`.
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..CLAIM_TRIP_SHORT_LEN].to_ascii_uppercase()
    }
}

// ---------------------------------------------------------------------------
// Wire enums
// ---------------------------------------------------------------------------

macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal {
            $($(#[$vmeta:meta])* $variant:ident => $wire:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                $(#[$vmeta])*
                #[serde(rename = $wire)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $wire,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_uppercase().as_str() {
                    $($wire => Ok($name::$variant),)+
                    _ => Err(ParseEnumError::new($kind, s)),
                }
            }
        }
    };
}

wire_enum!(
    /// Pricing region of a trip.
    Region, "region" {
        Domestic => "DOMESTIC",
        International => "INTERNATIONAL",
    }
);

wire_enum!(
    /// Lifecycle status of a trip. Archived trips are read-only for edits.
    TripStatus, "trip status" {
        Active => "ACTIVE",
        Archived => "ARCHIVED",
    }
);

wire_enum!(
    PaymentStatus, "payment status" {
        Paid => "PAID",
        Unpaid => "UNPAID",
        Partial => "PARTIAL",
    }
);

wire_enum!(
    /// Direction of a ledger entry. Only `CHARGE` adds to the balance.
    EntryKind, "ledger entry kind" {
        /// Money collected from the payer.
        Charge => "CHARGE",
        /// Credit handed back to the payer.
        Credit => "CREDIT",
        /// Refund issued to the payer.
        Refund => "REFUND",
    }
);

impl EntryKind {
    pub fn adds_to_balance(&self) -> bool {
        matches!(self, EntryKind::Charge)
    }
}

wire_enum!(
    /// Who performed an action.
    ActorRole, "actor role" {
        Leader => "LEADER",
        Admin => "ADMIN",
        System => "SYSTEM",
    }
);

wire_enum!(
    ClaimStatus, "claim status" {
        Submitted => "SUBMITTED",
        InReview => "IN_REVIEW",
        MoreInfo => "MORE_INFO",
        Approved => "APPROVED",
        Denied => "DENIED",
        Closed => "CLOSED",
    }
);

wire_enum!(
    /// Every kind of entry that can appear in a trip's history.
    EventType, "history event type" {
        TripCreated => "TRIP_CREATED",
        TripUpdated => "TRIP_UPDATED",
        TripPaymentStatusUpdated => "TRIP_PAYMENT_STATUS_UPDATED",
        TripStatusUpdated => "TRIP_STATUS_UPDATED",
        MemberAdded => "MEMBER_ADDED",
        MemberUpdated => "MEMBER_UPDATED",
        MemberRemoved => "MEMBER_REMOVED",
        PaymentApplied => "PAYMENT_APPLIED",
        CoverageAllocated => "COVERAGE_ALLOCATED",
        CoverageReleased => "COVERAGE_RELEASED",
        CoverageTransferred => "COVERAGE_TRANSFERRED",
        ClaimSubmitted => "CLAIM_SUBMITTED",
        ClaimCreated => "CLAIM_CREATED",
        ClaimStatusUpdated => "CLAIM_STATUS_UPDATED",
        ClaimNoteAdded => "CLAIM_NOTE_ADDED",
        ClaimMessageAdded => "CLAIM_MESSAGE_ADDED",
        ClaimAttachmentAdded => "CLAIM_ATTACHMENT_ADDED",
    }
);
