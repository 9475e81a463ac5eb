//! Output reservations: keep concurrent builds from selecting the same
//! account output.
//!
//! An account output picked by a build is held for that template until the
//! reservation's ttl elapses or the template is finalized. Every builder on
//! one ledger must share one [`Reservations`] handle. Expiry is lazy:
//! an expired entry is treated as free on lookup and purged on the next
//! reservation pass. Outputs named explicitly by the caller (orderbook
//! redeem/cancel) are not reserved; the ledger decides those races.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use offerledger_types::{OfferLedgerError, Outpoint, Result, TemplateId};

#[derive(Debug, Clone, Copy)]
struct Reservation {
    template: TemplateId,
    until: DateTime<Utc>,
}

/// Outpoint reservations keyed by template.
#[derive(Debug, Default)]
pub struct ReservationTable {
    held: HashMap<Outpoint, Reservation>,
    by_template: HashMap<TemplateId, Vec<Outpoint>>,
}

impl ReservationTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `outpoint` is held by an unexpired reservation at `now`.
    #[must_use]
    pub fn is_reserved(&self, outpoint: &Outpoint, now: DateTime<Utc>) -> bool {
        self.held.get(outpoint).is_some_and(|r| now < r.until)
    }

    /// Reserve every outpoint for `template` until `until`. All or nothing:
    /// if any outpoint is already held, nothing is reserved.
    ///
    /// # Errors
    /// Returns [`OfferLedgerError::AlreadySpent`] naming the first held outpoint.
    pub fn reserve(
        &mut self,
        template: TemplateId,
        outpoints: &[Outpoint],
        until: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.purge_expired(now);
        if let Some(held) = outpoints.iter().find(|op| self.is_reserved(op, now)) {
            return Err(OfferLedgerError::AlreadySpent(*held));
        }
        for outpoint in outpoints {
            self.held.insert(*outpoint, Reservation { template, until });
        }
        self.by_template
            .entry(template)
            .or_default()
            .extend_from_slice(outpoints);
        Ok(())
    }

    /// Release everything `template` holds. Returns the number released.
    pub fn release(&mut self, template: &TemplateId) -> usize {
        let Some(outpoints) = self.by_template.remove(template) else {
            return 0;
        };
        let mut released = 0;
        for outpoint in outpoints {
            // A lapsed reservation may have been taken over by another template.
            if self.held.get(&outpoint).is_some_and(|r| r.template == *template) {
                self.held.remove(&outpoint);
                released += 1;
            }
        }
        released
    }

    /// Drop reservations whose ttl has elapsed. Returns the number dropped.
    pub fn purge_expired(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.held.len();
        self.held.retain(|_, r| now < r.until);
        let held = &self.held;
        self.by_template.retain(|template, outpoints| {
            outpoints.retain(|op| held.get(op).is_some_and(|r| r.template == *template));
            !outpoints.is_empty()
        });
        before - self.held.len()
    }

    /// Number of outpoints currently held, expired or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.held.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }
}

/// Shared handle to one [`ReservationTable`]. Clones refer to the same table.
#[derive(Debug, Clone, Default)]
pub struct Reservations(Arc<Mutex<ReservationTable>>);

impl Reservations {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the table. Selection and reservation of one build must happen
    /// under a single guard.
    pub fn lock(&self) -> MutexGuard<'_, ReservationTable> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
