//! The operation surface used by the UI/API layer.
//!
//! Each sub-module groups related operations by domain.  Every mutating
//! operation runs inside [`TripDesk::atomically`]: the state change, the
//! coverage reconcile and the history event are committed together or not
//! at all.

mod claims;
mod coverage;
mod members;
mod payments;
mod rates;
mod reports;
mod trips;

use chrono::{DateTime, Utc};
use tracing::debug;

use tripcover_shared::{EventType, MemberId, TripId};
use tripcover_store::{HistoryEvent, LedgerEntry, Member, RecordStore, Trip};

use crate::clock::{Clock, SystemClock};
use crate::coverage::{compute_coverage, CoverageSummary};
use crate::error::{CoreError, Result};
use crate::history::{new_event, Actor};
use crate::ledger::{self, derive_payment_status};

pub use members::{MemberPatch, NewMember};
pub use trips::{NewTrip, TripPatch};

/// Coverage, ledger and claims operations over one record store.
pub struct TripDesk<S> {
    store: S,
    clock: Box<dyn Clock>,
}

impl<S: RecordStore> TripDesk<S> {
    pub fn new(store: S) -> Self {
        Self::with_clock(store, SystemClock::default())
    }

    pub fn with_clock(store: S, clock: impl Clock + 'static) -> Self {
        Self {
            store,
            clock: Box::new(clock),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Run `f` in one store transaction with a single timestamp for the
    /// whole operation.
    fn atomically<T>(&mut self, f: impl FnOnce(&mut Tx<'_, S>) -> Result<T>) -> Result<T> {
        let now = self.clock.now();
        self.store.transaction(|store| {
            let mut tx = Tx { store, now };
            f(&mut tx)
        })
    }
}

fn load_trip<S: RecordStore>(store: &S, trip_id: TripId) -> Result<Trip> {
    store
        .by_id::<Trip>(trip_id.0)?
        .ok_or_else(|| CoreError::not_found("trip", trip_id))
}

fn load_member<S: RecordStore>(store: &S, trip_id: TripId, member_id: MemberId) -> Result<Member> {
    store
        .by_id::<Member>(member_id.0)?
        .filter(|m| m.trip_id == trip_id)
        .ok_or_else(|| CoreError::not_found("member", member_id))
}

fn roster<S: RecordStore>(store: &S, trip_id: TripId) -> Result<Vec<Member>> {
    Ok(store.for_trip::<Member>(trip_id.0)?)
}

fn balance<S: RecordStore>(store: &S, trip_id: TripId) -> Result<i64> {
    let entries = store.for_trip::<LedgerEntry>(trip_id.0)?;
    Ok(ledger::balance(&entries))
}

fn summary<S: RecordStore>(store: &S, trip: &Trip) -> Result<CoverageSummary> {
    let members = roster(store, trip.id)?;
    Ok(compute_coverage(trip, &members, balance(store, trip.id)?))
}

/// Write access to the store for the duration of one operation.
pub(crate) struct Tx<'a, S> {
    store: &'a mut S,
    now: DateTime<Utc>,
}

impl<S: RecordStore> Tx<'_, S> {
    fn trip(&self, trip_id: TripId) -> Result<Trip> {
        load_trip(&*self.store, trip_id)
    }

    /// Load a trip that accepts edits.
    fn editable_trip(&self, trip_id: TripId) -> Result<Trip> {
        let trip = self.trip(trip_id)?;
        if trip.is_archived() {
            return Err(CoreError::validation(format!(
                "trip {trip_id} is archived and read-only"
            )));
        }
        Ok(trip)
    }

    fn member(&self, trip_id: TripId, member_id: MemberId) -> Result<Member> {
        load_member(&*self.store, trip_id, member_id)
    }

    fn summary(&self, trip: &Trip) -> Result<CoverageSummary> {
        summary(&*self.store, trip)
    }

    fn log(
        &mut self,
        trip_id: TripId,
        event_type: EventType,
        actor: &Actor,
        notes: impl Into<String>,
    ) -> Result<HistoryEvent> {
        let event = new_event(trip_id, event_type, actor, self.now, notes.into());
        self.store.insert(&event)?;
        Ok(event)
    }

    /// Recompute coverage and refresh the fields derived from it: each
    /// member's `coverage_as_of`, the trip's payment status and its cached
    /// credit total.
    fn reconcile(&mut self, trip_id: TripId) -> Result<Reconciliation> {
        let mut trip = self.trip(trip_id)?;
        let members = roster(&*self.store, trip_id)?;
        let summary = compute_coverage(&trip, &members, balance(&*self.store, trip_id)?);

        let mut newly_covered = Vec::new();
        let mut released = Vec::new();
        for mut member in members {
            match (summary.is_covered(member.id), member.coverage_as_of) {
                (true, None) => {
                    member.coverage_as_of = Some(self.now);
                    newly_covered.push(member.full_name());
                    self.store.put(&member)?;
                }
                (false, Some(_)) => {
                    member.coverage_as_of = None;
                    released.push(member.full_name());
                    self.store.put(&member)?;
                }
                _ => {}
            }
        }

        let payment_status = derive_payment_status(&summary);
        if trip.payment_status != payment_status || trip.credits_total_cents != summary.balance {
            trip.payment_status = payment_status;
            trip.credits_total_cents = summary.balance;
            self.store.put(&trip)?;
        }

        debug!(
            trip_id = %trip_id,
            covered = summary.covered_count,
            eligible = summary.eligible_count,
            balance = summary.balance,
            "Coverage reconciled"
        );

        Ok(Reconciliation {
            summary,
            newly_covered,
            released,
        })
    }
}

/// Outcome of [`Tx::reconcile`].
#[derive(Debug)]
pub(crate) struct Reconciliation {
    summary: CoverageSummary,
    newly_covered: Vec<String>,
    released: Vec<String>,
}

impl Reconciliation {
    /// `base` followed by the seats that changed hands, for history notes.
    fn notes(&self, base: impl Into<String>) -> String {
        let mut out = base.into();
        if !self.newly_covered.is_empty() {
            out.push_str(&format!(". Auto-allocated: {}", self.newly_covered.join(", ")));
        }
        if !self.released.is_empty() {
            out.push_str(&format!(". Released: {}", self.released.join(", ")));
        }
        out
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use chrono::{Duration, NaiveDate};
    use tripcover_shared::Region;
    use tripcover_store::MemoryStore;

    use super::*;
    use crate::clock::StepClock;

    pub fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-05-01T09:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    pub fn desk() -> TripDesk<MemoryStore> {
        TripDesk::with_clock(MemoryStore::new(), StepClock::new(t0(), Duration::seconds(1)))
    }

    pub fn leader() -> Actor {
        Actor::leader("leader-1")
    }

    pub fn admin() -> Actor {
        Actor::admin("ops")
    }

    /// Domestic trip 2025-06-01..=2025-06-07 at 125 cents: one seat is 875.
    pub fn june_trip(desk: &mut TripDesk<MemoryStore>) -> Trip {
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

    pub fn adult(desk: &mut TripDesk<MemoryStore>, trip: &Trip, first: &str, last: &str) -> Member {
        desk.add_member(
            trip.id,
            NewMember {
                first_name: first.into(),
                last_name: last.into(),
                confirmed: true,
                ..NewMember::default()
            },
            &leader(),
        )
        .unwrap()
    }

    pub fn pay(desk: &mut TripDesk<MemoryStore>, trip: &Trip, cents: i64) {
        desk.record_payment(
            trip.id,
            cents,
            tripcover_shared::EntryKind::Charge,
            crate::ledger::PaymentMeta::default(),
            &admin(),
        )
        .unwrap();
    }

    pub fn event_types(desk: &TripDesk<MemoryStore>, trip: &Trip) -> Vec<EventType> {
        desk.history(trip.id)
            .unwrap()
            .into_iter()
            .map(|e| e.event_type)
            .collect()
    }
}
