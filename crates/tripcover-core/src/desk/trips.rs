use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use tripcover_shared::{EventType, PaymentStatus, Region, TripId, TripStatus};
use tripcover_store::{Claim, HistoryEvent, LedgerEntry, Member, RecordStore, Trip};

use super::{load_trip, TripDesk};
use crate::error::{CoreError, Result};
use crate::history::Actor;
use crate::pricing::{validate_date_range, validate_rate};

/// Input for creating a trip.  Without `rate_cents` the trip snapshots the
/// current rate for its region.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTrip {
    pub title: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub region: Region,
    #[serde(default)]
    pub rate_cents: Option<i64>,
    #[serde(default)]
    pub leader_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TripPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub region: Option<Region>,
    #[serde(default)]
    pub rate_cents: Option<i64>,
}

fn validate_title(title: &str) -> Result<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(CoreError::validation("trip title is required"));
    }
    Ok(title.to_string())
}

impl<S: RecordStore> TripDesk<S> {
    pub fn create_trip(&mut self, new: NewTrip, actor: &Actor) -> Result<Trip> {
        let title = validate_title(&new.title)?;
        validate_date_range(new.start_date, new.end_date)?;
        if let Some(rate) = new.rate_cents {
            validate_rate(rate)?;
        }

        let trip = self.atomically(|tx| {
            let rate_cents = match new.rate_cents {
                Some(rate) => rate,
                None => tx.rate_for(new.region)?,
            };
            let trip = Trip {
                id: TripId::new(),
                leader_id: new.leader_id.clone(),
                title,
                start_date: new.start_date,
                end_date: new.end_date,
                region: new.region,
                rate_cents,
                status: TripStatus::Active,
                payment_status: PaymentStatus::Unpaid,
                credits_total_cents: 0,
                created_at: tx.now,
                updated_at: tx.now,
            };
            tx.store.insert(&trip)?;
            tx.log(
                trip.id,
                EventType::TripCreated,
                actor,
                format!(
                    "Trip \"{}\" created for {} to {} ({})",
                    trip.title, trip.start_date, trip.end_date, trip.region
                ),
            )?;
            Ok(trip)
        })?;

        info!(trip_id = %trip.id, title = %trip.title, rate = trip.rate_cents, "Trip created");
        Ok(trip)
    }

    /// Edit title, dates, region or rate.  A region change without an
    /// explicit rate re-snapshots the region's current rate.  An edit that
    /// changes nothing writes nothing.
    pub fn update_trip(&mut self, trip_id: TripId, patch: TripPatch, actor: &Actor) -> Result<Trip> {
        self.atomically(|tx| {
            let mut trip = tx.editable_trip(trip_id)?;
            let mut changed = Vec::new();

            if let Some(title) = &patch.title {
                let title = validate_title(title)?;
                if title != trip.title {
                    trip.title = title;
                    changed.push("title");
                }
            }

            let start = patch.start_date.unwrap_or(trip.start_date);
            let end = patch.end_date.unwrap_or(trip.end_date);
            validate_date_range(start, end)?;
            if (start, end) != (trip.start_date, trip.end_date) {
                trip.start_date = start;
                trip.end_date = end;
                changed.push("dates");
            }

            if let Some(region) = patch.region {
                if region != trip.region {
                    trip.region = region;
                    changed.push("region");
                    if patch.rate_cents.is_none() {
                        let rate = tx.rate_for(region)?;
                        if rate != trip.rate_cents {
                            trip.rate_cents = rate;
                            changed.push("rate");
                        }
                    }
                }
            }

            if let Some(rate) = patch.rate_cents {
                validate_rate(rate)?;
                if rate != trip.rate_cents {
                    trip.rate_cents = rate;
                    changed.push("rate");
                }
            }

            if changed.is_empty() {
                return Ok(trip);
            }

            trip.updated_at = tx.now;
            tx.store.put(&trip)?;
            let recon = tx.reconcile(trip_id)?;
            tx.log(
                trip_id,
                EventType::TripUpdated,
                actor,
                recon.notes(format!("Updated {}", changed.join(", "))),
            )?;
            info!(trip_id = %trip_id, changed = ?changed, "Trip updated");
            tx.trip(trip_id)
        })
    }

    /// Archive or reactivate a trip.  Setting the current status is a no-op.
    pub fn set_trip_status(
        &mut self,
        trip_id: TripId,
        status: TripStatus,
        actor: &Actor,
    ) -> Result<Trip> {
        self.atomically(|tx| {
            let mut trip = tx.trip(trip_id)?;
            if trip.status == status {
                return Ok(trip);
            }
            let previous = trip.status;
            trip.status = status;
            trip.updated_at = tx.now;
            tx.store.put(&trip)?;
            tx.log(
                trip_id,
                EventType::TripStatusUpdated,
                actor,
                format!("Status changed from {previous} to {status}"),
            )?;
            info!(trip_id = %trip_id, %previous, %status, "Trip status updated");
            Ok(trip)
        })
    }

    /// Admin override of the derived payment status.  The next coverage
    /// recompute derives it again from the ledger.
    pub fn set_payment_status(
        &mut self,
        trip_id: TripId,
        status: PaymentStatus,
        actor: &Actor,
    ) -> Result<Trip> {
        self.atomically(|tx| {
            let mut trip = tx.editable_trip(trip_id)?;
            if trip.payment_status == status {
                return Ok(trip);
            }
            let previous = trip.payment_status;
            trip.payment_status = status;
            trip.updated_at = tx.now;
            tx.store.put(&trip)?;
            tx.log(
                trip_id,
                EventType::TripPaymentStatusUpdated,
                actor,
                format!("Payment status changed from {previous} to {status}"),
            )?;
            info!(trip_id = %trip_id, %previous, %status, "Trip payment status updated");
            Ok(trip)
        })
    }

    /// Delete a trip together with its members, ledger, claims and history.
    pub fn delete_trip(&mut self, trip_id: TripId, actor: &Actor) -> Result<()> {
        self.atomically(|tx| {
            tx.trip(trip_id)?;
            let members = tx.store.remove_for_trip::<Member>(trip_id.0)?;
            let entries = tx.store.remove_for_trip::<LedgerEntry>(trip_id.0)?;
            let claims = tx.store.remove_for_trip::<Claim>(trip_id.0)?;
            let events = tx.store.remove_for_trip::<HistoryEvent>(trip_id.0)?;
            tx.store.remove::<Trip>(trip_id.0)?;
            info!(
                trip_id = %trip_id,
                actor = %actor.label(),
                members,
                entries,
                claims,
                events,
                "Trip deleted"
            );
            Ok(())
        })
    }

    pub fn get_trip(&self, trip_id: TripId) -> Result<Trip> {
        load_trip(&self.store, trip_id)
    }

    /// Every trip, optionally narrowed to one leader.
    pub fn list_trips(&self, leader_id: Option<&str>) -> Result<Vec<Trip>> {
        Ok(self
            .store
            .filter(|t: &Trip| leader_id.map_or(true, |id| t.leader_id.as_deref() == Some(id)))?)
    }
}
