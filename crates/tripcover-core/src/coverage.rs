//! Coverage engine.
//!
//! Who is covered is never stored; it is a view recomputed in full from the
//! roster and the ledger balance every time it is needed.  The same inputs
//! always produce the same seats:
//!
//! 1. `seat_cost = rate × days`.  A non-positive seat cost seats nobody.
//! 2. Eligible members are active, confirmed, and guardian-approved if minors.
//! 3. Eligible members are queued by [`seat_order`]: earliest confirmation
//!    first, unconfirmed last, then by last name.
//! 4. `floor(balance / seat_cost)` seats are paid for, clamped to the number
//!    of eligible members, and handed out from the front of the queue.
//!
//! Because seats are taken from the front, a shrinking balance releases the
//! most recently queued members first.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use tripcover_shared::MemberId;
use tripcover_store::{Member, Trip};

use crate::pricing::{days_inclusive, seat_cost};

/// Result of one coverage pass over a trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoverageSummary {
    pub days: i64,
    pub seat_cost: i64,
    pub balance: i64,
    pub eligible_ids: BTreeSet<MemberId>,
    pub covered_ids: BTreeSet<MemberId>,
    pub eligible_count: usize,
    pub covered_count: usize,
    /// Seats the balance pays for, before clamping to the eligible count.
    pub paid_seats: usize,
    /// Eligible members in seat order; the first `covered_count` are covered.
    pub seat_queue: Vec<MemberId>,
}

/// Where a member stands in the coverage view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MemberCoverage {
    Covered,
    /// Eligible, waiting for more payment.
    AwaitingPayment,
    PendingConfirmation,
    PendingGuardian,
    Standby,
}

impl CoverageSummary {
    pub fn is_covered(&self, id: MemberId) -> bool {
        self.covered_ids.contains(&id)
    }

    pub fn is_eligible(&self, id: MemberId) -> bool {
        self.eligible_ids.contains(&id)
    }

    /// Balance consumed by the covered seats.
    pub fn allocated_cents(&self) -> i64 {
        self.seat_cost.saturating_mul(self.covered_count as i64)
    }

    /// Balance not tied to any covered seat.
    pub fn unallocated_cents(&self) -> i64 {
        (self.balance - self.allocated_cents()).max(0)
    }

    /// Paid seats with nobody eligible to sit in them.
    pub fn spare_seats(&self) -> usize {
        self.paid_seats.saturating_sub(self.covered_count)
    }

    pub fn status_of(&self, member: &Member) -> MemberCoverage {
        if self.is_covered(member.id) {
            MemberCoverage::Covered
        } else if !member.active {
            MemberCoverage::Standby
        } else if !member.confirmed {
            MemberCoverage::PendingConfirmation
        } else if member.is_minor && !member.guardian_approved {
            MemberCoverage::PendingGuardian
        } else {
            MemberCoverage::AwaitingPayment
        }
    }
}

/// Queue order for eligible members.
///
/// Earlier seat key first (a transferred seat's inherited key, else the
/// confirmation time), members without one last, then last name and first
/// name case-insensitively, then id so the order is total.
///
/// Names compare by Unicode lowercase code points, not by a locale
/// collation.  Accented and non-Latin names still get a stable, total
/// order; it may differ from a dictionary order for some locales.
pub fn seat_order(a: &Member, b: &Member) -> Ordering {
    let by_key = match (a.seat_key(), b.seat_key()) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };

    by_key
        .then_with(|| {
            a.last_name
                .trim()
                .to_lowercase()
                .cmp(&b.last_name.trim().to_lowercase())
        })
        .then_with(|| {
            a.first_name
                .trim()
                .to_lowercase()
                .cmp(&b.first_name.trim().to_lowercase())
        })
        .then_with(|| a.id.cmp(&b.id))
}

/// Seat key for a member taking over `giver`'s seat.
///
/// One nanosecond ahead of the giver's key, so the receiver also precedes
/// every member tied with the giver and lands no later than the giver's
/// queue position.  A giver without a key sorted behind every keyed member;
/// `now` puts the receiver there, ahead of the other keyless members.
pub fn inherited_seat_key(giver: &Member, now: DateTime<Utc>) -> DateTime<Utc> {
    match giver.seat_key() {
        Some(key) => key - Duration::nanoseconds(1),
        None => now,
    }
}

/// Compute which members of `trip` are covered by `balance`.
///
/// Members belonging to other trips are ignored.
pub fn compute_coverage(trip: &Trip, members: &[Member], balance: i64) -> CoverageSummary {
    let days = days_inclusive(trip.start_date, trip.end_date);
    let seat_cost = seat_cost(trip);

    let mut eligible: Vec<&Member> = members
        .iter()
        .filter(|m| m.trip_id == trip.id && m.is_eligible())
        .collect();
    eligible.sort_by(|a, b| seat_order(a, b));

    let paid_seats = if seat_cost <= 0 || balance <= 0 {
        0
    } else {
        usize::try_from(balance / seat_cost).unwrap_or(usize::MAX)
    };
    let covered_count = paid_seats.min(eligible.len());

    let seat_queue: Vec<MemberId> = eligible.iter().map(|m| m.id).collect();

    CoverageSummary {
        days,
        seat_cost,
        balance,
        eligible_ids: seat_queue.iter().copied().collect(),
        covered_ids: seat_queue[..covered_count].iter().copied().collect(),
        eligible_count: eligible.len(),
        covered_count,
        paid_seats,
        seat_queue,
    }
}
