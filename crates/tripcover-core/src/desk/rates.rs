use chrono::NaiveDate;
use tracing::info;

use tripcover_shared::constants::{DEFAULT_DOMESTIC_RATE_CENTS, DEFAULT_INTERNATIONAL_RATE_CENTS};
use tripcover_shared::{RateId, Region};
use tripcover_store::{Rate, RecordStore};

use super::{Tx, TripDesk};
use crate::error::Result;
use crate::history::Actor;
use crate::pricing::{self, validate_date_range, validate_rate};

/// Built-in rate for a region with no stored rate.
pub fn default_rate(region: Region) -> i64 {
    match region {
        Region::Domestic => DEFAULT_DOMESTIC_RATE_CENTS,
        Region::International => DEFAULT_INTERNATIONAL_RATE_CENTS,
    }
}

fn stored_rate<S: RecordStore>(store: &S, region: Region) -> Result<Option<Rate>> {
    Ok(store
        .filter(|r: &Rate| r.region == region)?
        .into_iter()
        .next())
}

fn rate_cents<S: RecordStore>(store: &S, region: Region) -> Result<i64> {
    Ok(stored_rate(store, region)?
        .map(|r| r.rate_cents)
        .unwrap_or_else(|| default_rate(region)))
}

impl<S: RecordStore> Tx<'_, S> {
    pub(super) fn rate_for(&self, region: Region) -> Result<i64> {
        rate_cents(&*self.store, region)
    }
}

impl<S: RecordStore> TripDesk<S> {
    /// Per-person-per-day rate new trips in `region` snapshot.
    pub fn current_rate(&self, region: Region) -> Result<i64> {
        rate_cents(&self.store, region)
    }

    /// Change a region's rate.  Existing trips keep the rate they
    /// snapshotted.
    pub fn set_rate(&mut self, region: Region, cents: i64, actor: &Actor) -> Result<Rate> {
        validate_rate(cents)?;
        let rate = self.atomically(|tx| {
            let rate = match stored_rate(&*tx.store, region)? {
                Some(mut rate) => {
                    rate.rate_cents = cents;
                    rate.updated_at = tx.now;
                    rate
                }
                None => Rate {
                    id: RateId::new(),
                    region,
                    rate_cents: cents,
                    updated_at: tx.now,
                },
            };
            tx.store.put(&rate)?;
            Ok(rate)
        })?;
        info!(%region, cents, actor = %actor.label(), "Rate updated");
        Ok(rate)
    }

    pub fn list_rates(&self) -> Result<Vec<Rate>> {
        Ok(self.store.all::<Rate>()?)
    }

    /// Store `defaults` for regions that have no rate yet.  Returns how many
    /// were inserted.
    pub fn seed_default_rates(&mut self, defaults: &[(Region, i64)]) -> Result<usize> {
        for (_, cents) in defaults {
            validate_rate(*cents)?;
        }
        let seeded = self.atomically(|tx| {
            let mut seeded = 0;
            for &(region, cents) in defaults {
                if stored_rate(&*tx.store, region)?.is_none() {
                    tx.store.insert(&Rate {
                        id: RateId::new(),
                        region,
                        rate_cents: cents,
                        updated_at: tx.now,
                    })?;
                    seeded += 1;
                }
            }
            Ok(seeded)
        })?;
        if seeded > 0 {
            info!(seeded, "Default rates seeded");
        }
        Ok(seeded)
    }

    /// Price of covering `headcount` travelers in `region` for the range.
    pub fn quote(&self, region: Region, start: NaiveDate, end: NaiveDate, headcount: u32) -> Result<i64> {
        validate_date_range(start, end)?;
        Ok(pricing::quote(self.current_rate(region)?, start, end, headcount))
    }
}
