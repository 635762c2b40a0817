// 🧮 Dues Service - repository-facing operations
//
// Resolves donors through an injected repository and clock, then hands the
// records to the pure reconciliation engine. A missing donor is reported as
// `DuesError::DonorNotFound`; callers decide whether that renders as empty.

use crate::clock::Clock;
use crate::config::DuesConfig;
use crate::dues::{total_due, DuesReport};
use crate::entities::Donor;
use crate::errors::{DuesError, Result};
use crate::month_label::MonthLabel;
use crate::notices::{Notice, NoticeGenerator};
use crate::reconciliation::{DonorReconciliation, ReconciliationEngine};
use crate::repository::{DonorRepository, SkippedDonor};
use crate::status::{StatusAuditEntry, StatusPolicy};
use log::{debug, info, warn};

/// Outcome of reconciling every donor
#[derive(Debug, Default)]
pub struct ReconciledDonors {
    pub entries: Vec<(Donor, DonorReconciliation)>,
    pub skipped: Vec<SkippedDonor>,
}

pub struct DuesService<R, C> {
    repo: R,
    clock: C,
    engine: ReconciliationEngine,
    policy: StatusPolicy,
    notices: NoticeGenerator,
}

impl<R: DonorRepository, C: Clock> DuesService<R, C> {
    pub fn new(repo: R, clock: C) -> Self {
        Self::from_config(repo, clock, &DuesConfig::default())
    }

    pub fn from_config(repo: R, clock: C, config: &DuesConfig) -> Self {
        DuesService {
            repo,
            clock,
            engine: ReconciliationEngine::with_max_span(config.max_span_months),
            policy: StatusPolicy::new(config.defaulter_threshold),
            notices: NoticeGenerator::new(&config.mosque_name, &config.currency)
                .with_min_missing_months(config.notice_min_missing_months),
        }
    }

    fn resolve_donor(&self, donor_id: &str) -> Result<Donor> {
        self.repo
            .find_donor(donor_id)?
            .ok_or_else(|| DuesError::DonorNotFound(donor_id.to_string()))
    }

    /// Owed months without a monthly-donation payment, ascending.
    pub fn get_missing_months(&self, donor_id: &str) -> Result<Vec<MonthLabel>> {
        let donor = self.resolve_donor(donor_id)?;
        let payments = self.repo.payments_for_donor(donor_id)?;
        self.engine
            .missing_months(&donor, &payments, self.clock.today())
    }

    /// Months with a monthly-donation payment on record, ascending.
    pub fn get_donor_paid_months(&self, donor_id: &str) -> Result<Vec<MonthLabel>> {
        self.resolve_donor(donor_id)?;
        let payments = self.repo.payments_for_donor(donor_id)?;
        Ok(self.engine.paid_months(donor_id, &payments))
    }

    pub fn total_due(&self, donor_id: &str) -> Result<f64> {
        let donor = self.resolve_donor(donor_id)?;
        let payments = self.repo.payments_for_donor(donor_id)?;
        let missing = self
            .engine
            .missing_months(&donor, &payments, self.clock.today())?;
        Ok(total_due(donor.monthly_amount, missing.len()))
    }

    pub fn reconcile_donor(&self, donor_id: &str) -> Result<DonorReconciliation> {
        let donor = self.resolve_donor(donor_id)?;
        self.reconcile(&donor)
    }

    fn reconcile(&self, donor: &Donor) -> Result<DonorReconciliation> {
        let payments = self.repo.payments_for_donor(&donor.id)?;
        let rec = self.engine.reconcile(donor, &payments, self.clock.today())?;

        if !rec.unrecognized_labels.is_empty() {
            warn!(
                "Donor {} has {} payment(s) with unrecognized month labels: {:?}",
                donor.id,
                rec.unrecognized_labels.len(),
                rec.unrecognized_labels
            );
        }
        debug!("{}", rec.summary());

        Ok(rec)
    }

    /// Reconcile every donor. Donors with bad data end up in `skipped`;
    /// storage errors abort.
    pub fn reconcile_all(&self) -> Result<ReconciledDonors> {
        let mut batch = self.repo.all_donors()?;
        let mut entries = Vec::with_capacity(batch.donors.len());

        for donor in std::mem::take(&mut batch.donors) {
            match self.reconcile(&donor) {
                Ok(rec) => entries.push((donor, rec)),
                Err(e) if e.is_data_error() => batch.skip(&donor.id, &e),
                Err(e) => return Err(e),
            }
        }

        Ok(ReconciledDonors {
            entries,
            skipped: batch.skipped,
        })
    }

    pub fn dues_report(&self) -> Result<DuesReport> {
        let reconciled = self.reconcile_all()?;
        let recs: Vec<DonorReconciliation> =
            reconciled.entries.into_iter().map(|(_, rec)| rec).collect();
        let report = DuesReport::from_reconciliations(self.clock.today(), &recs)
            .with_skipped(reconciled.skipped);
        info!("{}", report.summary());
        Ok(report)
    }

    /// Every donor with stored and suggested status, mismatches first.
    pub fn status_audit(&self) -> Result<Vec<StatusAuditEntry>> {
        let mut entries: Vec<StatusAuditEntry> = self
            .reconcile_all()?
            .entries
            .iter()
            .map(|(donor, rec)| self.policy.audit(donor, rec.missing_count()))
            .collect();

        entries.sort_by(|a, b| {
            b.is_mismatch()
                .cmp(&a.is_mismatch())
                .then_with(|| a.donor_name.cmp(&b.donor_name))
        });
        Ok(entries)
    }

    pub fn notices(&self) -> Result<Vec<Notice>> {
        let notices: Vec<Notice> = self
            .reconcile_all()?
            .entries
            .iter()
            .filter_map(|(donor, rec)| self.notices.notice_for(donor, rec))
            .collect();
        info!("Generated {} dues notice(s)", notices.len());
        Ok(notices)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::entities::{DonorStatus, Payment};
    use crate::repository::InMemoryRepository;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn create_test_service() -> DuesService<InMemoryRepository, FixedClock> {
        let donors = vec![
            Donor::new("Amina", "0300-1", "", 500.0, date(2024, 1, 15)).with_id("amina"),
            Donor::new("Bilal", "0300-2", "", 300.0, date(2023, 10, 1)).with_id("bilal"),
            Donor::new("Khalid", "0300-3", "", 1000.0, date(2024, 6, 1)).with_id("khalid"),
            Donor::new("Old Record", "", "", 100.0, date(1900, 1, 1)).with_id("corrupt"),
        ];
        let payments = vec![
            Payment::monthly("amina", "January 2024", 500.0, date(2024, 1, 20)),
            Payment::monthly("amina", "March 2024", 500.0, date(2024, 3, 20)),
            Payment::monthly("bilal", "April 2024", 300.0, date(2024, 4, 2)),
        ];

        DuesService::new(
            InMemoryRepository::with_donors(donors, payments),
            FixedClock(date(2024, 4, 10)),
        )
    }

    #[test]
    fn test_get_missing_and_paid_months() {
        let service = create_test_service();

        let missing: Vec<String> = service
            .get_missing_months("amina")
            .unwrap()
            .iter()
            .map(|m| m.label())
            .collect();
        assert_eq!(missing, vec!["February 2024", "April 2024"]);

        let paid: Vec<String> = service
            .get_donor_paid_months("amina")
            .unwrap()
            .iter()
            .map(|m| m.label())
            .collect();
        assert_eq!(paid, vec!["January 2024", "March 2024"]);

        assert_eq!(service.total_due("amina").unwrap(), 1000.0);

        // Oct 2023 through Mar 2024 unpaid
        assert_eq!(service.total_due("bilal").unwrap(), 6.0 * 300.0);
        assert!(matches!(service.total_due("nobody"), Err(DuesError::DonorNotFound(_))));
    }

    #[test]
    fn test_unknown_donor_is_distinct_from_zero_dues() {
        let service = create_test_service();

        assert!(matches!(
            service.get_missing_months("nobody"),
            Err(DuesError::DonorNotFound(_))
        ));
        assert!(matches!(
            service.get_donor_paid_months("nobody"),
            Err(DuesError::DonorNotFound(_))
        ));

        // Future start: donor exists, nothing owed
        assert!(service.get_missing_months("khalid").unwrap().is_empty());
        assert_eq!(service.total_due("khalid").unwrap(), 0.0);
    }

    #[test]
    fn test_corrupt_start_date_is_surfaced() {
        let service = create_test_service();
        let err = service.get_missing_months("corrupt").unwrap_err();
        assert!(matches!(err, DuesError::ObligationSpanTooLong { .. }));
    }

    #[test]
    fn test_dues_report_skips_bad_records() {
        let service = create_test_service();
        let report = service.dues_report().unwrap();

        // amina 2 × 500, bilal 6 × 300 (Oct..Mar), khalid nothing, corrupt skipped
        assert_eq!(report.rows.len(), 3);
        assert_eq!(report.donors_with_dues, 2);
        assert_eq!(report.total_outstanding, 1000.0 + 1800.0);

        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].donor_id, "corrupt");
        assert!(report.skipped[0].reason.contains("exceeds the limit"));
    }

    #[test]
    fn test_status_audit() {
        let service = create_test_service();
        let audit = service.status_audit().unwrap();

        let first = &audit[0];
        assert_eq!(first.donor_id, "bilal");
        assert_eq!(first.suggested, DonorStatus::Defaulter);
        assert!(first.is_mismatch());
        assert_eq!(audit.iter().filter(|e| e.is_mismatch()).count(), 1);
    }

    #[test]
    fn test_notices() {
        let service = create_test_service();
        let notices = service.notices().unwrap();

        let names: Vec<&str> = notices.iter().map(|n| n.donor_name.as_str()).collect();
        assert_eq!(names, vec!["Amina", "Bilal"]);
    }
}
