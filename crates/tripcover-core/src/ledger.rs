//! Append-only payment ledger.
//!
//! The balance is always recomputed from every entry; nothing caches it
//! authoritatively.

use serde::{Deserialize, Serialize};

use tripcover_shared::PaymentStatus;
use tripcover_store::LedgerEntry;

use crate::coverage::CoverageSummary;
use crate::pricing::format_cents;

/// Net credits on a trip: charges minus credits and refunds.
pub fn balance(entries: &[LedgerEntry]) -> i64 {
    entries.iter().map(LedgerEntry::signed_cents).sum()
}

/// Optional provider details attached to a ledger entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMeta {
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub provider_ref: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}

/// Payment status implied by the ledger and the current roster.
pub fn derive_payment_status(summary: &CoverageSummary) -> PaymentStatus {
    if summary.balance <= 0 {
        return PaymentStatus::Unpaid;
    }
    let full = summary
        .seat_cost
        .saturating_mul(summary.eligible_count as i64);
    if summary.eligible_count > 0 && summary.balance >= full {
        PaymentStatus::Paid
    } else {
        PaymentStatus::Partial
    }
}

/// One-line description of an entry for history notes.
pub fn describe_entry(entry: &LedgerEntry) -> String {
    let kind = match entry.kind {
        tripcover_shared::EntryKind::Charge => "Payment",
        tripcover_shared::EntryKind::Credit => "Credit",
        tripcover_shared::EntryKind::Refund => "Refund",
    };
    let mut out = format!("{kind} of {} applied", format_cents(entry.amount_cents));
    if let Some(provider) = entry.provider.as_deref() {
        out.push_str(&format!(" via {provider}"));
    }
    if let Some(reference) = entry.provider_ref.as_deref() {
        out.push_str(&format!(" (ref {reference})"));
    }
    if let Some(note) = entry.note.as_deref().filter(|n| !n.trim().is_empty()) {
        out.push_str(&format!(": {}", note.trim()));
    }
    out
}
