use tracing::info;

use tripcover_shared::{EntryId, EntryKind, EventType, TripId};
use tripcover_store::{LedgerEntry, RecordStore};

use super::{balance, load_trip, TripDesk};
use crate::error::{CoreError, Result};
use crate::history::Actor;
use crate::ledger::{describe_entry, PaymentMeta};

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl<S: RecordStore> TripDesk<S> {
    /// Append a ledger entry and recompute coverage.  A refund that leaves
    /// the balance short releases the most recently queued seats.
    pub fn record_payment(
        &mut self,
        trip_id: TripId,
        amount_cents: i64,
        kind: EntryKind,
        meta: PaymentMeta,
        actor: &Actor,
    ) -> Result<LedgerEntry> {
        if amount_cents <= 0 {
            return Err(CoreError::validation(format!(
                "amount must be positive, got {amount_cents} cents"
            )));
        }

        self.atomically(|tx| {
            tx.editable_trip(trip_id)?;
            let entry = LedgerEntry {
                id: EntryId::new(),
                trip_id,
                amount_cents,
                kind,
                provider: clean(meta.provider),
                provider_ref: clean(meta.provider_ref),
                note: clean(meta.note),
                created_at: tx.now,
            };
            tx.store.insert(&entry)?;

            let recon = tx.reconcile(trip_id)?;
            tx.log(
                trip_id,
                EventType::PaymentApplied,
                actor,
                recon.notes(describe_entry(&entry)),
            )?;
            info!(
                trip_id = %trip_id,
                entry_id = %entry.id,
                amount = amount_cents,
                kind = %kind,
                balance = recon.summary.balance,
                "Ledger entry recorded"
            );
            Ok(entry)
        })
    }

    /// Current balance, recomputed from every entry.
    pub fn ledger_balance(&self, trip_id: TripId) -> Result<i64> {
        load_trip(&self.store, trip_id)?;
        balance(&self.store, trip_id)
    }

    /// Ledger entries oldest first.
    pub fn ledger_entries(&self, trip_id: TripId) -> Result<Vec<LedgerEntry>> {
        load_trip(&self.store, trip_id)?;
        Ok(self.store.for_trip::<LedgerEntry>(trip_id.0)?)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;
    use tripcover_shared::PaymentStatus;

    #[test]
    fn test_balance_follows_entries() {
        let mut desk = desk();
        let trip = june_trip(&mut desk);
        pay(&mut desk, &trip, 1000);
        pay(&mut desk, &trip, 500);
        desk.record_payment(
            trip.id,
            300,
            EntryKind::Refund,
            PaymentMeta::default(),
            &admin(),
        )
        .unwrap();

        assert_eq!(desk.ledger_balance(trip.id).unwrap(), 1200);
        assert_eq!(desk.ledger_entries(trip.id).unwrap().len(), 3);
        assert_eq!(desk.get_trip(trip.id).unwrap().credits_total_cents, 1200);
    }

    #[test]
    fn test_non_positive_amount_is_rejected() {
        let mut desk = desk();
        let trip = june_trip(&mut desk);
        for amount in [0, -875] {
            let err = desk
                .record_payment(
                    trip.id,
                    amount,
                    EntryKind::Charge,
                    PaymentMeta::default(),
                    &admin(),
                )
                .unwrap_err();
            assert!(matches!(err, CoreError::Validation(_)));
        }
        assert!(desk.ledger_entries(trip.id).unwrap().is_empty());
        assert_eq!(event_types(&desk, &trip), vec![EventType::TripCreated]);
    }

    #[test]
    fn test_payment_note_mentions_auto_allocation() {
        let mut desk = desk();
        let trip = june_trip(&mut desk);
        adult(&mut desk, &trip, "Ann", "Able");

        desk.record_payment(
            trip.id,
            875,
            EntryKind::Charge,
            PaymentMeta {
                provider: Some("card".into()),
                provider_ref: Some("  ".into()),
                note: None,
            },
            &admin(),
        )
        .unwrap();

        let last = desk.history(trip.id).unwrap().pop().unwrap();
        assert_eq!(last.event_type, EventType::PaymentApplied);
        assert_eq!(
            last.notes,
            "Payment of $8.75 applied via card. Auto-allocated: Ann Able"
        );
        assert_eq!(
            desk.get_trip(trip.id).unwrap().payment_status,
            PaymentStatus::Paid
        );
    }

    #[test]
    fn test_unknown_trip() {
        let mut desk = desk();
        let err = desk
            .record_payment(
                TripId::new(),
                875,
                EntryKind::Charge,
                PaymentMeta::default(),
                &admin(),
            )
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(desk.store().is_empty());
    }
}
