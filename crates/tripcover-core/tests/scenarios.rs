//! End-to-end trip scenarios, run against both store backends.

use chrono::{DateTime, Duration, NaiveDate, Utc};

use tripcover_core::{
    Actor, ClaimPatch, NewClaim, NewMember, NewTrip, PaymentMeta, ReceiptOptions, StepClock,
    TripDesk,
};
use tripcover_shared::{ClaimStatus, EntryKind, EventType, MemberId, Region};
use tripcover_store::{Database, MemoryStore, RecordStore, Trip};

fn clock() -> StepClock {
    let start = DateTime::parse_from_rfc3339("2025-05-01T09:00:00Z")
        .unwrap()
        .with_timezone(&Utc);
    StepClock::new(start, Duration::seconds(1))
}

fn memory_desk() -> TripDesk<MemoryStore> {
    TripDesk::with_clock(MemoryStore::new(), clock())
}

fn sqlite_desk(dir: &tempfile::TempDir) -> TripDesk<Database> {
    let db = Database::open_at(&dir.path().join("tripcover.db")).unwrap();
    TripDesk::with_clock(db, clock())
}

fn leader() -> Actor {
    Actor::leader("leader-1")
}

fn admin() -> Actor {
    Actor::admin("ops")
}

fn june_trip<S: RecordStore>(desk: &mut TripDesk<S>) -> Trip {
    desk.create_trip(
        NewTrip {
            title: "June Hike".into(),
            start_date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2025, 6, 7).unwrap(),
            region: Region::Domestic,
            rate_cents: Some(125),
            leader_id: Some("leader-1".into()),
        },
        &leader(),
    )
    .unwrap()
}

fn member<S: RecordStore>(
    desk: &mut TripDesk<S>,
    trip: &Trip,
    first: &str,
    last: &str,
    is_minor: bool,
) -> MemberId {
    desk.add_member(
        trip.id,
        NewMember {
            first_name: first.into(),
            last_name: last.into(),
            is_minor,
            confirmed: true,
            ..NewMember::default()
        },
        &leader(),
    )
    .unwrap()
    .id
}

fn apply<S: RecordStore>(desk: &mut TripDesk<S>, trip: &Trip, cents: i64, kind: EntryKind) {
    desk.record_payment(trip.id, cents, kind, PaymentMeta::default(), &admin())
        .unwrap();
}

fn full_payment_covers_one_seat<S: RecordStore>(mut desk: TripDesk<S>) {
    let trip = june_trip(&mut desk);
    let ann = member(&mut desk, &trip, "Ann", "Able", false);
    apply(&mut desk, &trip, 875, EntryKind::Charge);

    let summary = desk.coverage_summary(trip.id).unwrap();
    assert_eq!(summary.seat_cost, 875);
    assert_eq!(summary.covered_count, 1);
    assert_eq!(summary.unallocated_cents(), 0);
    assert!(summary.is_covered(ann));
}

fn surplus_stays_unallocated<S: RecordStore>(mut desk: TripDesk<S>) {
    let trip = june_trip(&mut desk);
    member(&mut desk, &trip, "Ann", "Able", false);
    apply(&mut desk, &trip, 1750, EntryKind::Charge);

    let summary = desk.coverage_summary(trip.id).unwrap();
    assert_eq!(summary.covered_count, 1);
    assert_eq!(summary.unallocated_cents(), 875);

    let receipt = desk.receipt(trip.id, ReceiptOptions::default()).unwrap();
    assert_eq!(receipt.refund_eligible_cents(), 875);
    assert_eq!(receipt.balance_due_cents(), 0);
}

fn minor_needs_guardian<S: RecordStore>(mut desk: TripDesk<S>) {
    let trip = june_trip(&mut desk);
    let kit = member(&mut desk, &trip, "Kit", "Young", true);
    apply(&mut desk, &trip, 875, EntryKind::Charge);

    let summary = desk.coverage_summary(trip.id).unwrap();
    assert_eq!(summary.eligible_count, 0);
    assert!(!summary.is_covered(kit));

    let receipt = desk.receipt(trip.id, ReceiptOptions::default()).unwrap();
    assert_eq!(receipt.not_covered()[0].reason.label(), "No guardian approval");
}

fn removal_frees_balance<S: RecordStore>(mut desk: TripDesk<S>) {
    let trip = june_trip(&mut desk);
    let ann = member(&mut desk, &trip, "Ann", "Able", false);
    apply(&mut desk, &trip, 875, EntryKind::Charge);

    desk.remove_member(trip.id, ann, &leader()).unwrap();
    let summary = desk.coverage_summary(trip.id).unwrap();
    assert_eq!(summary.covered_count, 0);
    assert_eq!(summary.spare_seats(), 1);
    assert_eq!(
        desk.history(trip.id).unwrap().last().map(|e| e.event_type),
        Some(EventType::MemberRemoved)
    );

    let bob = member(&mut desk, &trip, "Bob", "Baker", false);
    assert!(desk.coverage_summary(trip.id).unwrap().is_covered(bob));
}

fn refund_truncates_from_the_back<S: RecordStore>(mut desk: TripDesk<S>) {
    let trip = june_trip(&mut desk);
    let first = member(&mut desk, &trip, "Zed", "Zulu", false);
    let second = member(&mut desk, &trip, "Amy", "Adams", false);
    let third = member(&mut desk, &trip, "Max", "Moss", false);
    apply(&mut desk, &trip, 875 * 3, EntryKind::Charge);
    assert_eq!(desk.coverage_summary(trip.id).unwrap().covered_count, 3);

    apply(&mut desk, &trip, 875 + 1, EntryKind::Refund);
    let summary = desk.coverage_summary(trip.id).unwrap();
    assert_eq!(summary.covered_count, 1);
    assert!(summary.is_covered(first));
    assert!(!summary.is_covered(second));
    assert!(!summary.is_covered(third));
    assert_eq!(desk.ledger_balance(trip.id).unwrap(), 875 * 2 - 1);
}

fn transfer_is_all_or_nothing<S: RecordStore>(mut desk: TripDesk<S>) {
    let trip = june_trip(&mut desk);
    let ann = member(&mut desk, &trip, "Ann", "Able", false);
    let kit = member(&mut desk, &trip, "Kit", "Young", true);
    let bob = member(&mut desk, &trip, "Bob", "Baker", false);
    apply(&mut desk, &trip, 875, EntryKind::Charge);

    assert!(desk.transfer_coverage(trip.id, ann, kit, &admin()).is_err());
    let summary = desk.coverage_summary(trip.id).unwrap();
    assert!(summary.is_covered(ann));
    assert!(!summary.is_covered(kit));

    desk.transfer_coverage(trip.id, ann, bob, &admin()).unwrap();
    let summary = desk.coverage_summary(trip.id).unwrap();
    assert!(summary.is_covered(bob) && !summary.is_covered(ann));
    let transfers = desk
        .history(trip.id)
        .unwrap()
        .iter()
        .filter(|e| e.event_type == EventType::CoverageTransferred)
        .count();
    assert_eq!(transfers, 1);
}

fn claim_lifecycle<S: RecordStore>(mut desk: TripDesk<S>) {
    let trip = june_trip(&mut desk);
    let ann = member(&mut desk, &trip, "Ann", "Able", false);
    let claim = desk
        .create_claim(
            NewClaim {
                trip_id: Some(trip.id),
                member_id: Some(ann),
                incident_description: "Missed connection".into(),
                ..NewClaim::default()
            },
            &leader(),
        )
        .unwrap();

    let claim = desk
        .update_claim(claim.id, ClaimPatch::status(ClaimStatus::InReview), &admin())
        .unwrap();
    assert!(claim.fresh_for_leader && !claim.fresh_for_admin);

    desk.add_claim_message(claim.id, "Attached the boarding pass", None, &leader())
        .unwrap();
    let claim = desk.get_claim(claim.id).unwrap();
    assert!(claim.fresh_for_admin && !claim.fresh_for_leader);
    assert_eq!(claim.messages.len(), 1);

    desk.delete_trip(trip.id, &admin()).unwrap();
    assert!(desk.get_claim(claim.id).unwrap_err().is_not_found());
}

macro_rules! on_both_stores {
    ($($scenario:ident),* $(,)?) => {
        mod memory {
            $(
                #[test]
                fn $scenario() {
                    super::$scenario(super::memory_desk());
                }
            )*
        }

        mod sqlite {
            $(
                #[test]
                fn $scenario() {
                    let dir = tempfile::tempdir().unwrap();
                    super::$scenario(super::sqlite_desk(&dir));
                }
            )*
        }
    };
}

on_both_stores!(
    full_payment_covers_one_seat,
    surplus_stays_unallocated,
    minor_needs_guardian,
    removal_frees_balance,
    refund_truncates_from_the_back,
    transfer_is_all_or_nothing,
    claim_lifecycle,
);

#[test]
fn sqlite_state_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let (trip, ann) = {
        let mut desk = sqlite_desk(&dir);
        let trip = june_trip(&mut desk);
        let ann = member(&mut desk, &trip, "Ann", "Able", false);
        apply(&mut desk, &trip, 875, EntryKind::Charge);
        (trip, ann)
    };

    let desk = sqlite_desk(&dir);
    assert!(desk.coverage_summary(trip.id).unwrap().is_covered(ann));
    assert_eq!(desk.history(trip.id).unwrap().len(), 3);
    assert!(desk
        .get_member(trip.id, ann)
        .unwrap()
        .coverage_as_of
        .is_some());
}
