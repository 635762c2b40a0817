// 📚 Donor Repository - the collections the engine reads
//
// Lookups return `Option` so callers decide what a missing donor means.
// Bulk loads keep going past a bad row and report it in `DonorBatch::skipped`.

use crate::entities::{Donor, DonorRegistry, Payment, PaymentLedger};
use crate::errors::{DuesError, Result};
use log::warn;
use serde::Serialize;

/// A donor left out of a bulk operation, and why
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedDonor {
    pub donor_id: String,
    pub reason: String,
}

/// Result of loading every donor: the usable ones plus the rejected rows
#[derive(Debug, Default)]
pub struct DonorBatch {
    pub donors: Vec<Donor>,
    pub skipped: Vec<SkippedDonor>,
}

impl DonorBatch {
    pub fn from_donors(donors: Vec<Donor>) -> Self {
        DonorBatch {
            donors,
            skipped: Vec::new(),
        }
    }

    pub fn skip(&mut self, donor_id: &str, error: &DuesError) {
        warn!("Skipping donor {}: {}", donor_id, error);
        self.skipped.push(SkippedDonor {
            donor_id: donor_id.to_string(),
            reason: error.to_string(),
        });
    }
}

pub trait DonorRepository {
    /// Current version of a donor, if known
    fn find_donor(&self, id: &str) -> Result<Option<Donor>>;

    /// Current versions of all donors. Rows with bad data are reported in
    /// `skipped`; only storage failures are errors.
    fn all_donors(&self) -> Result<DonorBatch>;

    /// Monthly-donation payments credited to `donor_id`
    fn payments_for_donor(&self, donor_id: &str) -> Result<Vec<Payment>>;
}

impl<R: DonorRepository + ?Sized> DonorRepository for &R {
    fn find_donor(&self, id: &str) -> Result<Option<Donor>> {
        (**self).find_donor(id)
    }

    fn all_donors(&self) -> Result<DonorBatch> {
        (**self).all_donors()
    }

    fn payments_for_donor(&self, donor_id: &str) -> Result<Vec<Payment>> {
        (**self).payments_for_donor(donor_id)
    }
}

/// Repository over the in-memory registry and ledger.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    pub donors: DonorRegistry,
    pub ledger: PaymentLedger,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_donors(donors: Vec<Donor>, payments: Vec<Payment>) -> Self {
        let repo = Self::new();
        for donor in donors {
            repo.donors.register(donor);
        }
        for payment in payments {
            repo.ledger.record(payment);
        }
        repo
    }
}

impl DonorRepository for InMemoryRepository {
    fn find_donor(&self, id: &str) -> Result<Option<Donor>> {
        Ok(self.donors.get_current_version(id))
    }

    fn all_donors(&self) -> Result<DonorBatch> {
        Ok(DonorBatch::from_donors(self.donors.all_donors()))
    }

    fn payments_for_donor(&self, donor_id: &str) -> Result<Vec<Payment>> {
        Ok(self.ledger.monthly_donations_for(donor_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::IncomeSource;
    use chrono::NaiveDate;

    #[test]
    fn test_in_memory_repository() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let donor = Donor::new("Hamza", "", "", 250.0, start).with_id("d1");
        let mut gift = Payment::monthly("d1", "January 2024", 100.0, start);
        gift.source = IncomeSource::BoxCollection;

        let repo = InMemoryRepository::with_donors(
            vec![donor],
            vec![Payment::monthly("d1", "January 2024", 250.0, start), gift],
        );

        assert!(repo.find_donor("d1").unwrap().is_some());
        assert!(repo.find_donor("d2").unwrap().is_none());
        let batch = repo.all_donors().unwrap();
        assert_eq!(batch.donors.len(), 1);
        assert!(batch.skipped.is_empty());
        assert_eq!(repo.payments_for_donor("d1").unwrap().len(), 1);

        fn count_for(repo: impl DonorRepository) -> usize {
            repo.payments_for_donor("d1").unwrap().len()
        }
        assert_eq!(count_for(&repo), 1);
    }

    #[test]
    fn test_batch_records_skipped_rows() {
        let mut batch = DonorBatch::default();
        let err = DuesError::InvalidStartDate {
            donor_id: "d9".to_string(),
            value: "someday".to_string(),
        };
        batch.skip("d9", &err);

        assert_eq!(batch.skipped.len(), 1);
        assert_eq!(batch.skipped[0].donor_id, "d9");
        assert!(batch.skipped[0].reason.contains("someday"));
    }
}
