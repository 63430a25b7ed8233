use tracing::{info, warn};

use tripcover_shared::{EventType, MemberId, TripId};
use tripcover_store::{Member, RecordStore};

use super::{load_trip, roster, summary, TripDesk};
use crate::coverage::{inherited_seat_key, CoverageSummary, MemberCoverage};
use crate::error::{CoreError, Result};
use crate::history::Actor;

impl<S: RecordStore> TripDesk<S> {
    /// Current coverage view of a trip.
    pub fn coverage_summary(&self, trip_id: TripId) -> Result<CoverageSummary> {
        let trip = load_trip(&self.store, trip_id)?;
        summary(&self.store, &trip)
    }

    /// Every rostered member with their coverage status, in roster order.
    pub fn member_statuses(&self, trip_id: TripId) -> Result<Vec<(Member, MemberCoverage)>> {
        let trip = load_trip(&self.store, trip_id)?;
        let summary = summary(&self.store, &trip)?;
        Ok(roster(&self.store, trip_id)?
            .into_iter()
            .map(|m| {
                let status = summary.status_of(&m);
                (m, status)
            })
            .collect())
    }

    /// Give `member_id` a seat out of spare paid capacity.
    ///
    /// The member is confirmed, guardian-approved if a minor, and taken off
    /// standby.  Fails with [`CoreError::Capacity`] when every paid seat is
    /// already taken.  An already covered member is left as is.
    pub fn allocate_coverage(
        &mut self,
        trip_id: TripId,
        member_id: MemberId,
        actor: &Actor,
    ) -> Result<CoverageSummary> {
        self.atomically(|tx| {
            let trip = tx.editable_trip(trip_id)?;
            let mut member = tx.member(trip_id, member_id)?;
            let before = tx.summary(&trip)?;

            if before.is_covered(member_id) {
                return Ok(before);
            }
            if before.spare_seats() == 0 {
                warn!(
                    trip_id = %trip_id,
                    member_id = %member_id,
                    unallocated = before.unallocated_cents(),
                    "Allocation rejected: no spare seat"
                );
                return Err(CoreError::Capacity {
                    required: before.seat_cost,
                    available: before.unallocated_cents(),
                });
            }

            if !member.confirmed {
                member.confirmed = true;
                member.confirmed_at = Some(tx.now);
            }
            if member.is_minor && !member.guardian_approved {
                member.guardian_approved = true;
                member.guardian_approved_at = Some(tx.now);
            }
            member.active = true;
            tx.store.put(&member)?;

            let recon = tx.reconcile(trip_id)?;
            if !recon.summary.is_covered(member_id) {
                return Err(CoreError::NotEligible(member_id));
            }
            tx.log(
                trip_id,
                EventType::CoverageAllocated,
                actor,
                format!("Seat allocated to {}", member.full_name()),
            )?;
            info!(trip_id = %trip_id, member_id = %member_id, "Coverage allocated");
            Ok(recon.summary)
        })
    }

    /// Take a covered member's seat away and put them on standby.  The seat
    /// goes to the next member in the queue, if any.
    pub fn release_coverage(
        &mut self,
        trip_id: TripId,
        member_id: MemberId,
        reason: Option<&str>,
        actor: &Actor,
    ) -> Result<CoverageSummary> {
        self.atomically(|tx| {
            let trip = tx.editable_trip(trip_id)?;
            let mut member = tx.member(trip_id, member_id)?;
            if !tx.summary(&trip)?.is_covered(member_id) {
                return Err(CoreError::validation(format!(
                    "{} does not hold a seat",
                    member.full_name()
                )));
            }

            member.active = false;
            member.seat_priority_at = None;
            tx.store.put(&member)?;

            let recon = tx.reconcile(trip_id)?;
            let mut notes = format!("Seat released from {}", member.full_name());
            if let Some(reason) = reason.map(str::trim).filter(|r| !r.is_empty()) {
                notes.push_str(&format!(" ({reason})"));
            }
            let replacement: Vec<&str> = recon
                .newly_covered
                .iter()
                .map(String::as_str)
                .collect();
            if !replacement.is_empty() {
                notes.push_str(&format!(". Auto-allocated: {}", replacement.join(", ")));
            }
            tx.log(trip_id, EventType::CoverageReleased, actor, notes)?;
            info!(trip_id = %trip_id, member_id = %member_id, reason = ?reason, "Coverage released");
            Ok(recon.summary)
        })
    }

    /// Move a seat from `from` to `to` in one step.
    ///
    /// `from` must hold a seat and `to` must be eligible without one.  `to`
    /// inherits `from`'s queue position, so exactly one of the two is covered
    /// afterwards and nobody else's seat moves.
    pub fn transfer_coverage(
        &mut self,
        trip_id: TripId,
        from: MemberId,
        to: MemberId,
        actor: &Actor,
    ) -> Result<CoverageSummary> {
        if from == to {
            return Err(CoreError::validation(
                "cannot transfer a seat to the same member",
            ));
        }

        self.atomically(|tx| {
            let trip = tx.editable_trip(trip_id)?;
            let mut giver = tx.member(trip_id, from)?;
            let mut taker = tx.member(trip_id, to)?;
            let before = tx.summary(&trip)?;

            if !before.is_covered(from) {
                return Err(CoreError::NotEligible(from));
            }
            if !before.is_eligible(to) || before.is_covered(to) {
                return Err(CoreError::NotEligible(to));
            }

            taker.seat_priority_at = Some(inherited_seat_key(&giver, tx.now));
            giver.active = false;
            giver.seat_priority_at = None;
            tx.store.put(&giver)?;
            tx.store.put(&taker)?;

            let recon = tx.reconcile(trip_id)?;
            if !recon.summary.is_covered(to) || recon.summary.is_covered(from) {
                warn!(trip_id = %trip_id, from = %from, to = %to, "Transfer rolled back");
                return Err(CoreError::NotEligible(to));
            }
            tx.log(
                trip_id,
                EventType::CoverageTransferred,
                actor,
                format!(
                    "Seat transferred from {} to {}",
                    giver.full_name(),
                    taker.full_name()
                ),
            )?;
            info!(trip_id = %trip_id, from = %from, to = %to, "Coverage transferred");
            Ok(recon.summary)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;
    use crate::desk::{MemberPatch, NewMember};
    use crate::clock::StepClock;
    use chrono::Duration;
    use tripcover_shared::{EntryKind, PaymentStatus};
    use tripcover_store::MemoryStore;

    #[test]
    fn test_allocate_from_spare_capacity() {
        let mut desk = desk();
        let trip = june_trip(&mut desk);
        let pending = desk
            .add_member(
                trip.id,
                NewMember {
                    first_name: "Kit".into(),
                    last_name: "Young".into(),
                    is_minor: true,
                    ..NewMember::default()
                },
                &leader(),
            )
            .unwrap();
        pay(&mut desk, &trip, 875);

        let summary = desk.allocate_coverage(trip.id, pending.id, &admin()).unwrap();
        assert!(summary.is_covered(pending.id));

        let kit = desk.get_member(trip.id, pending.id).unwrap();
        assert!(kit.confirmed && kit.guardian_approved);
        assert!(kit.coverage_as_of.is_some());
        assert_eq!(
            event_types(&desk, &trip).last(),
            Some(&EventType::CoverageAllocated)
        );
        assert_eq!(
            desk.get_trip(trip.id).unwrap().payment_status,
            PaymentStatus::Paid
        );
    }

    #[test]
    fn test_allocate_without_capacity_changes_nothing() {
        let mut desk = desk();
        let trip = june_trip(&mut desk);
        let ann = adult(&mut desk, &trip, "Ann", "Able");
        let bob = desk
            .add_member(
                trip.id,
                NewMember {
                    first_name: "Bob".into(),
                    last_name: "Baker".into(),
                    ..NewMember::default()
                },
                &leader(),
            )
            .unwrap();
        pay(&mut desk, &trip, 875 + 500);
        let events = event_types(&desk, &trip);

        let err = desk.allocate_coverage(trip.id, bob.id, &admin()).unwrap_err();
        match err {
            CoreError::Capacity {
                required,
                available,
            } => {
                assert_eq!(required, 875);
                assert_eq!(available, 500);
            }
            other => panic!("expected capacity error, got {other:?}"),
        }

        assert!(!desk.get_member(trip.id, bob.id).unwrap().confirmed);
        assert!(desk.coverage_summary(trip.id).unwrap().is_covered(ann.id));
        assert_eq!(event_types(&desk, &trip), events);
    }

    #[test]
    fn test_allocate_covered_member_is_noop() {
        let mut desk = desk();
        let trip = june_trip(&mut desk);
        let ann = adult(&mut desk, &trip, "Ann", "Able");
        pay(&mut desk, &trip, 875);
        let events = event_types(&desk, &trip);

        let summary = desk.allocate_coverage(trip.id, ann.id, &admin()).unwrap();
        assert!(summary.is_covered(ann.id));
        assert_eq!(event_types(&desk, &trip), events);
    }

    #[test]
    fn test_release_moves_seat_down_the_queue() {
        let mut desk = desk();
        let trip = june_trip(&mut desk);
        let ann = adult(&mut desk, &trip, "Ann", "Able");
        let bob = adult(&mut desk, &trip, "Bob", "Baker");
        pay(&mut desk, &trip, 875);

        let summary = desk
            .release_coverage(trip.id, ann.id, Some("cancelled"), &admin())
            .unwrap();
        assert!(summary.is_covered(bob.id));
        assert!(!summary.is_covered(ann.id));

        let ann = desk.get_member(trip.id, ann.id).unwrap();
        assert!(!ann.active);

        let last = desk.history(trip.id).unwrap().pop().unwrap();
        assert_eq!(last.event_type, EventType::CoverageReleased);
        assert_eq!(
            last.notes,
            "Seat released from Ann Able (cancelled). Auto-allocated: Bob Baker"
        );
    }

    #[test]
    fn test_release_uncovered_member_is_rejected() {
        let mut desk = desk();
        let trip = june_trip(&mut desk);
        let ann = adult(&mut desk, &trip, "Ann", "Able");
        let err = desk
            .release_coverage(trip.id, ann.id, None, &admin())
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
        assert!(desk.get_member(trip.id, ann.id).unwrap().active);
    }

    #[test]
    fn test_transfer_swaps_exactly_one_seat() {
        let mut desk = desk();
        let trip = june_trip(&mut desk);
        let ann = adult(&mut desk, &trip, "Ann", "Able");
        let bob = adult(&mut desk, &trip, "Bob", "Baker");
        let cat = adult(&mut desk, &trip, "Cat", "Cole");
        let dan = adult(&mut desk, &trip, "Dan", "Dunn");
        pay(&mut desk, &trip, 875 * 2);

        // Ann and Bob are seated; hand Ann's seat to Dan, skipping Cat.
        let summary = desk
            .transfer_coverage(trip.id, ann.id, dan.id, &admin())
            .unwrap();
        assert!(summary.is_covered(dan.id));
        assert!(summary.is_covered(bob.id));
        assert!(!summary.is_covered(ann.id));
        assert!(!summary.is_covered(cat.id));

        let events = event_types(&desk, &trip);
        assert_eq!(events.last(), Some(&EventType::CoverageTransferred));
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(
                    e,
                    EventType::CoverageAllocated | EventType::CoverageReleased
                ))
                .count(),
            0
        );

        // A later top-up seats Cat, not Ann.
        pay(&mut desk, &trip, 875);
        let summary = desk.coverage_summary(trip.id).unwrap();
        assert!(summary.is_covered(cat.id));
        assert!(!summary.is_covered(ann.id));
    }

    #[test]
    fn test_transfer_with_tied_confirmation_times() {
        let clock = StepClock::new(t0(), Duration::zero());
        let mut desk = TripDesk::with_clock(MemoryStore::new(), clock);
        let trip = june_trip(&mut desk);
        let adams = adult(&mut desk, &trip, "Amy", "Adams");
        let baker = adult(&mut desk, &trip, "Bob", "Baker");
        let young = adult(&mut desk, &trip, "Yan", "Young");
        assert_eq!(adams.confirmed_at, young.confirmed_at);
        pay(&mut desk, &trip, 875);
        assert!(desk.coverage_summary(trip.id).unwrap().is_covered(adams.id));

        let summary = desk
            .transfer_coverage(trip.id, adams.id, young.id, &admin())
            .unwrap();
        assert!(summary.is_covered(young.id));
        assert!(!summary.is_covered(adams.id));
        assert!(!summary.is_covered(baker.id));
        assert_eq!(
            event_types(&desk, &trip).last(),
            Some(&EventType::CoverageTransferred)
        );
    }

    #[test]
    fn test_transfer_requires_eligible_receiver() {
        let mut desk = desk();
        let trip = june_trip(&mut desk);
        let ann = adult(&mut desk, &trip, "Ann", "Able");
        let bob = adult(&mut desk, &trip, "Bob", "Baker");
        let kid = desk
            .add_member(
                trip.id,
                NewMember {
                    first_name: "Kit".into(),
                    last_name: "Young".into(),
                    is_minor: true,
                    confirmed: true,
                    ..NewMember::default()
                },
                &leader(),
            )
            .unwrap();
        pay(&mut desk, &trip, 875 * 2);
        let events = event_types(&desk, &trip);

        let err = desk
            .transfer_coverage(trip.id, ann.id, kid.id, &admin())
            .unwrap_err();
        assert!(matches!(err, CoreError::NotEligible(id) if id == kid.id));

        let err = desk
            .transfer_coverage(trip.id, ann.id, bob.id, &admin())
            .unwrap_err();
        assert!(matches!(err, CoreError::NotEligible(id) if id == bob.id));

        let summary = desk.coverage_summary(trip.id).unwrap();
        assert!(summary.is_covered(ann.id) && summary.is_covered(bob.id));
        assert!(desk.get_member(trip.id, ann.id).unwrap().active);
        assert_eq!(event_types(&desk, &trip), events);
    }

    #[test]
    fn test_standby_member_drops_inherited_position() {
        let mut desk = desk();
        let trip = june_trip(&mut desk);
        let ann = adult(&mut desk, &trip, "Ann", "Able");
        let bob = adult(&mut desk, &trip, "Bob", "Baker");
        pay(&mut desk, &trip, 875);
        desk.transfer_coverage(trip.id, ann.id, bob.id, &admin())
            .unwrap();
        assert!(desk
            .get_member(trip.id, bob.id)
            .unwrap()
            .seat_priority_at
            .is_some());

        let bob = desk
            .update_member(
                trip.id,
                bob.id,
                MemberPatch {
                    active: Some(false),
                    ..MemberPatch::default()
                },
                &leader(),
            )
            .unwrap();
        assert!(bob.seat_priority_at.is_none());
        assert!(bob.coverage_as_of.is_none());
    }

    #[test]
    fn test_refund_releases_latest_seat() {
        let mut desk = desk();
        let trip = june_trip(&mut desk);
        let ann = adult(&mut desk, &trip, "Ann", "Able");
        let bob = adult(&mut desk, &trip, "Bob", "Baker");
        pay(&mut desk, &trip, 875 * 2);

        desk.record_payment(
            trip.id,
            300,
            EntryKind::Refund,
            crate::ledger::PaymentMeta::default(),
            &admin(),
        )
        .unwrap();

        let statuses = desk.member_statuses(trip.id).unwrap();
        let status = |id| statuses.iter().find(|(m, _)| m.id == id).map(|(_, s)| *s);
        assert_eq!(status(ann.id), Some(MemberCoverage::Covered));
        assert_eq!(status(bob.id), Some(MemberCoverage::AwaitingPayment));

        let last = desk.history(trip.id).unwrap().pop().unwrap();
        assert_eq!(last.notes, "Refund of $3.00 applied. Released: Bob Baker");
    }
}
