//! # tripcover-core
//!
//! Coverage allocation and ledger engine for group trip insurance.
//!
//! The pure building blocks ([`pricing`], [`ledger`], [`coverage`],
//! [`claims`], [`receipt`]) compute derived state from plain values.
//! [`TripDesk`] is the operation surface: it loads state from a
//! [`RecordStore`](tripcover_store::RecordStore), applies one mutation inside
//! a single store transaction, recomputes coverage and appends exactly one
//! history event.

pub mod claims;
pub mod clock;
pub mod coverage;
pub mod desk;
pub mod history;
pub mod ledger;
pub mod pricing;
pub mod receipt;

mod error;

pub use claims::{ClaimPatch, NewAttachment, NewClaim};
pub use clock::{Clock, StepClock, SystemClock};
pub use coverage::{compute_coverage, CoverageSummary, MemberCoverage};
pub use desk::{MemberPatch, NewMember, NewTrip, TripDesk, TripPatch};
pub use error::{CoreError, Result};
pub use history::Actor;
pub use ledger::PaymentMeta;
pub use receipt::{build_receipt_snapshot, NotCoveredReason, ReceiptOptions, ReceiptSnapshot};
