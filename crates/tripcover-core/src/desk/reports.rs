use tripcover_shared::TripId;
use tripcover_store::{HistoryEvent, RecordStore};

use super::{balance, load_trip, roster, TripDesk};
use crate::error::Result;
use crate::history::chronological;
use crate::receipt::{build_receipt_snapshot, ReceiptOptions, ReceiptSnapshot};

impl<S: RecordStore> TripDesk<S> {
    /// Audit log of a trip, oldest first.
    pub fn history(&self, trip_id: TripId) -> Result<Vec<HistoryEvent>> {
        load_trip(&self.store, trip_id)?;
        Ok(chronological(self.store.for_trip::<HistoryEvent>(trip_id.0)?))
    }

    /// Receipt for the trip as it stands right now.
    pub fn receipt(&self, trip_id: TripId, opts: ReceiptOptions) -> Result<ReceiptSnapshot> {
        let trip = load_trip(&self.store, trip_id)?;
        let members = roster(&self.store, trip_id)?;
        let credits = balance(&self.store, trip_id)?;
        Ok(build_receipt_snapshot(&trip, &members, credits, opts))
    }
}
