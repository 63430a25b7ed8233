//! Point-in-time receipts.
//!
//! A [`ReceiptSnapshot`] is built once from the state the payer is looking at
//! and never changes afterwards.  Later mutations need a new snapshot.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use tripcover_shared::{Region, TripId};
use tripcover_store::{Member, Trip};

use crate::coverage::{compute_coverage, seat_order};
use crate::pricing::format_cents;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReceiptOptions {
    /// Stamped on the receipt; defaults to the build time.
    #[serde(default)]
    pub issued_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub payer_name: Option<String>,
}

/// Why a rostered member holds no seat.  Only the first applicable reason is
/// reported, in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotCoveredReason {
    Standby,
    NotConfirmed,
    NoGuardianApproval,
    AwaitingPayment,
}

impl NotCoveredReason {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Standby => "Standby",
            Self::NotConfirmed => "Not confirmed",
            Self::NoGuardianApproval => "No guardian approval",
            Self::AwaitingPayment => "Awaiting payment",
        }
    }

    fn for_member(member: &Member) -> Self {
        if !member.active {
            Self::Standby
        } else if !member.confirmed {
            Self::NotConfirmed
        } else if member.is_minor && !member.guardian_approved {
            Self::NoGuardianApproval
        } else {
            Self::AwaitingPayment
        }
    }
}

impl fmt::Display for NotCoveredReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotCoveredLine {
    pub name: String,
    pub reason: NotCoveredReason,
}

/// Frozen receipt contents.  Fields are read through accessors only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReceiptSnapshot {
    trip_id: TripId,
    trip_title: String,
    start_date: NaiveDate,
    end_date: NaiveDate,
    region: Region,
    rate_cents: i64,
    days: i64,
    seat_cost_cents: i64,
    covered_names: Vec<String>,
    not_covered: Vec<NotCoveredLine>,
    covered_count: usize,
    subtotal_cents: i64,
    credits_cents: i64,
    balance_due_cents: i64,
    refund_eligible_cents: i64,
    payer_name: Option<String>,
    issued_at: DateTime<Utc>,
}

impl ReceiptSnapshot {
    pub fn trip_id(&self) -> TripId {
        self.trip_id
    }

    pub fn trip_title(&self) -> &str {
        &self.trip_title
    }

    pub fn days(&self) -> i64 {
        self.days
    }

    pub fn seat_cost_cents(&self) -> i64 {
        self.seat_cost_cents
    }

    /// Covered travelers in seat order.
    pub fn covered_names(&self) -> &[String] {
        &self.covered_names
    }

    /// Everyone else on the roster, by last name then first name.
    pub fn not_covered(&self) -> &[NotCoveredLine] {
        &self.not_covered
    }

    pub fn not_covered_names(&self) -> Vec<&str> {
        self.not_covered.iter().map(|l| l.name.as_str()).collect()
    }

    pub fn covered_count(&self) -> usize {
        self.covered_count
    }

    pub fn subtotal_cents(&self) -> i64 {
        self.subtotal_cents
    }

    pub fn credits_cents(&self) -> i64 {
        self.credits_cents
    }

    pub fn balance_due_cents(&self) -> i64 {
        self.balance_due_cents
    }

    pub fn refund_eligible_cents(&self) -> i64 {
        self.refund_eligible_cents
    }

    pub fn payer_name(&self) -> Option<&str> {
        self.payer_name.as_deref()
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    /// Plain-text rendition for printing or email bodies.
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ReceiptSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "COVERAGE RECEIPT")?;
        writeln!(f, "Trip: {}", self.trip_title)?;
        writeln!(
            f,
            "Dates: {} to {} ({} days, {})",
            self.start_date, self.end_date, self.days, self.region
        )?;
        writeln!(
            f,
            "Rate: {} per person per day, {} per traveler",
            format_cents(self.rate_cents),
            format_cents(self.seat_cost_cents)
        )?;
        if let Some(payer) = &self.payer_name {
            writeln!(f, "Payer: {payer}")?;
        }
        writeln!(f, "Issued: {}", self.issued_at.format("%Y-%m-%d %H:%M UTC"))?;

        writeln!(f)?;
        writeln!(f, "Covered ({}):", self.covered_count)?;
        if self.covered_names.is_empty() {
            writeln!(f, "  (none)")?;
        }
        for name in &self.covered_names {
            writeln!(f, "  {name}")?;
        }

        if !self.not_covered.is_empty() {
            writeln!(f)?;
            writeln!(f, "Not covered ({}):", self.not_covered.len())?;
            for line in &self.not_covered {
                writeln!(f, "  {} - {}", line.name, line.reason)?;
            }
        }

        writeln!(f)?;
        writeln!(f, "Subtotal:        {}", format_cents(self.subtotal_cents))?;
        writeln!(f, "Credits:         {}", format_cents(self.credits_cents))?;
        writeln!(f, "Balance due:     {}", format_cents(self.balance_due_cents))?;
        write!(
            f,
            "Refund eligible: {}",
            format_cents(self.refund_eligible_cents)
        )
    }
}

/// Snapshot the receipt for `trip` given its roster and ledger balance.
pub fn build_receipt_snapshot(
    trip: &Trip,
    members: &[Member],
    ledger_balance: i64,
    opts: ReceiptOptions,
) -> ReceiptSnapshot {
    let summary = compute_coverage(trip, members, ledger_balance);

    let mut roster: Vec<&Member> = members.iter().filter(|m| m.trip_id == trip.id).collect();
    roster.sort_by(|a, b| seat_order(a, b));

    let covered_names: Vec<String> = roster
        .iter()
        .filter(|m| summary.is_covered(m.id))
        .map(|m| m.full_name())
        .collect();

    let mut uncovered: Vec<&Member> = roster
        .iter()
        .copied()
        .filter(|m| !summary.is_covered(m.id))
        .collect();
    uncovered.sort_by(|a, b| {
        let key = |m: &Member| (m.last_name.trim().to_lowercase(), m.first_name.trim().to_lowercase());
        key(a).cmp(&key(b)).then_with(|| a.id.cmp(&b.id))
    });
    let not_covered = uncovered
        .into_iter()
        .map(|m| NotCoveredLine {
            name: m.full_name(),
            reason: NotCoveredReason::for_member(m),
        })
        .collect();

    let subtotal = summary.allocated_cents();
    let credits = ledger_balance;

    ReceiptSnapshot {
        trip_id: trip.id,
        trip_title: trip.title.clone(),
        start_date: trip.start_date,
        end_date: trip.end_date,
        region: trip.region,
        rate_cents: trip.rate_cents,
        days: summary.days,
        seat_cost_cents: summary.seat_cost,
        covered_names,
        not_covered,
        covered_count: summary.covered_count,
        subtotal_cents: subtotal,
        credits_cents: credits,
        balance_due_cents: (subtotal - credits).max(0),
        refund_eligible_cents: (credits - subtotal).max(0),
        payer_name: opts.payer_name,
        issued_at: opts.issued_at.unwrap_or_else(Utc::now),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tripcover_shared::{MemberId, PaymentStatus, TripStatus};

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-05-01T09:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn trip() -> Trip {
        Trip {
            id: TripId::new(),
            leader_id: None,
            title: "Lake District".into(),
            start_date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2025, 6, 7).unwrap(),
            region: Region::Domestic,
            rate_cents: 125,
            status: TripStatus::Active,
            payment_status: PaymentStatus::Unpaid,
            credits_total_cents: 0,
            created_at: t0(),
            updated_at: t0(),
        }
    }

    fn member(trip: &Trip, first: &str, last: &str, confirmed_min: Option<i64>) -> Member {
        Member {
            id: MemberId::new(),
            trip_id: trip.id,
            first_name: first.into(),
            last_name: last.into(),
            email: None,
            phone: None,
            is_minor: false,
            confirmed: confirmed_min.is_some(),
            confirmed_at: confirmed_min.map(|m| t0() + Duration::minutes(m)),
            guardian_approved: false,
            guardian_approved_at: None,
            guardian_name: None,
            guardian_email: None,
            guardian_phone: None,
            active: true,
            coverage_as_of: None,
            seat_priority_at: None,
            created_at: t0(),
        }
    }

    fn roster(trip: &Trip) -> Vec<Member> {
        let mut standby = member(trip, "Sid", "Idle", Some(0));
        standby.active = false;
        let mut kid = member(trip, "Kit", "Young", Some(2));
        kid.is_minor = true;
        vec![
            member(trip, "Zoe", "Zimmer", Some(3)),
            member(trip, "Ann", "Able", Some(1)),
            member(trip, "Ned", "Nobody", None),
            standby,
            kid,
            member(trip, "Bea", "Baker", Some(4)),
        ]
    }

    #[test]
    fn test_names_split_with_first_reason() {
        let trip = trip();
        let receipt = build_receipt_snapshot(&trip, &roster(&trip), 875 * 2, ReceiptOptions::default());

        assert_eq!(receipt.covered_names(), ["Ann Able", "Zoe Zimmer"]);
        let reasons: Vec<_> = receipt
            .not_covered()
            .iter()
            .map(|l| (l.name.as_str(), l.reason))
            .collect();
        assert_eq!(
            reasons,
            vec![
                ("Bea Baker", NotCoveredReason::AwaitingPayment),
                ("Sid Idle", NotCoveredReason::Standby),
                ("Ned Nobody", NotCoveredReason::NotConfirmed),
                ("Kit Young", NotCoveredReason::NoGuardianApproval),
            ]
        );
    }

    #[test]
    fn test_totals() {
        let trip = trip();
        let members = roster(&trip);

        let short = build_receipt_snapshot(&trip, &members, 1000, ReceiptOptions::default());
        assert_eq!(short.subtotal_cents(), 875);
        assert_eq!(short.balance_due_cents(), 0);
        assert_eq!(short.refund_eligible_cents(), 125);

        let none = build_receipt_snapshot(&trip, &members, 0, ReceiptOptions::default());
        assert_eq!(none.covered_count(), 0);
        assert_eq!(none.subtotal_cents(), 0);
        assert_eq!(none.refund_eligible_cents(), 0);
    }

    #[test]
    fn test_rebuilding_is_identical() {
        let trip = trip();
        let members = roster(&trip);
        let opts = ReceiptOptions {
            issued_at: Some(t0()),
            payer_name: Some("Pat Payer".into()),
        };

        let a = build_receipt_snapshot(&trip, &members, 875 * 3, opts.clone());
        let b = build_receipt_snapshot(&trip, &members, 875 * 3, opts);
        assert_eq!(a, b);
        assert_eq!(a.render(), b.render());
    }

    #[test]
    fn test_render_lists_sections() {
        let trip = trip();
        let receipt = build_receipt_snapshot(
            &trip,
            &roster(&trip),
            875,
            ReceiptOptions {
                issued_at: Some(t0()),
                payer_name: None,
            },
        );
        let text = receipt.render();
        assert!(text.starts_with("COVERAGE RECEIPT\nTrip: Lake District\n"));
        assert!(text.contains("Covered (1):\n  Ann Able\n"));
        assert!(text.contains("  Kit Young - No guardian approval\n"));
        assert!(text.contains("Subtotal:        $8.75"));
    }
}
