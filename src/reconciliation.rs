// ⚖️ Reconciliation Engine - which months has a donor not paid for?
//
// For every donor:
//   obligation = months from start_date's month through the current month
//   missing    = obligation - { parsed month labels of monthly-donation payments }
//
// Pure function of (today, donor, payments). Nothing is cached; every call
// recomputes from the records it is handed.

use crate::dues::total_due;
use crate::entities::{Donor, Payment};
use crate::errors::{DuesError, Result};
use crate::month_label::MonthLabel;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeSet;

/// Upper bound on the obligation walk (50 years).
pub const DEFAULT_MAX_SPAN_MONTHS: u32 = 600;

// ============================================================================
// PAYMENT SCAN
// ============================================================================

/// What a donor's monthly-donation payments say, before comparing to obligations.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PaymentScan {
    /// Recognized months with at least one payment
    pub paid: BTreeSet<MonthLabel>,

    /// Labels that did not parse as a month; they satisfy nothing
    pub unrecognized_labels: Vec<String>,

    /// Months paid more than once (no extra credit is given)
    pub duplicate_months: Vec<MonthLabel>,
}

// ============================================================================
// DONOR RECONCILIATION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DonorReconciliation {
    pub donor_id: String,
    pub donor_name: String,
    pub monthly_amount: f64,
    pub as_of: NaiveDate,

    /// Every month owed, ascending
    pub obligation: Vec<MonthLabel>,

    /// Owed months that are paid, ascending
    pub paid: Vec<MonthLabel>,

    /// Owed months that are not paid, ascending
    pub missing: Vec<MonthLabel>,

    /// Paid months outside the obligation window (before start or in the future)
    pub advance: Vec<MonthLabel>,

    pub unrecognized_labels: Vec<String>,
    pub duplicate_months: Vec<MonthLabel>,

    pub total_due: f64,
}

impl DonorReconciliation {
    pub fn missing_count(&self) -> usize {
        self.missing.len()
    }

    pub fn is_settled(&self) -> bool {
        self.missing.is_empty()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} ({}): {} of {} months paid, {} missing, due {:.2}",
            self.donor_name,
            self.donor_id,
            self.paid.len(),
            self.obligation.len(),
            self.missing.len(),
            self.total_due
        )
    }
}

// ============================================================================
// RECONCILIATION ENGINE
// ============================================================================

#[derive(Debug, Clone)]
pub struct ReconciliationEngine {
    /// Longest obligation walk accepted before the donor record is rejected
    pub max_span_months: u32,
}

impl ReconciliationEngine {
    pub fn new() -> Self {
        ReconciliationEngine {
            max_span_months: DEFAULT_MAX_SPAN_MONTHS,
        }
    }

    pub fn with_max_span(max_span_months: u32) -> Self {
        ReconciliationEngine { max_span_months }
    }

    /// Months the donor is liable for, from the start month through `today`'s month.
    ///
    /// Empty when the start date lies after `today`.
    pub fn obligation_months(&self, donor: &Donor, today: NaiveDate) -> Result<Vec<MonthLabel>> {
        if donor.start_date > today {
            return Ok(Vec::new());
        }

        let first = MonthLabel::from_date(donor.start_date);
        let last = MonthLabel::from_date(today);

        let span = first.months_through(&last);
        if span > self.max_span_months {
            return Err(DuesError::ObligationSpanTooLong {
                donor_id: donor.id.clone(),
                months: span,
                max: self.max_span_months,
            });
        }

        let mut months = Vec::with_capacity(span as usize);
        let mut current = Some(first);
        while let Some(month) = current {
            if month > last {
                break;
            }
            months.push(month);
            current = month.next();
        }

        Ok(months)
    }

    /// Classify the donor's monthly-donation payments by month.
    ///
    /// Payments of other sources or other donors are ignored, so the full
    /// ledger may be passed in.
    pub fn scan_payments(&self, donor_id: &str, payments: &[Payment]) -> PaymentScan {
        let mut scan = PaymentScan::default();
        let mut duplicates = BTreeSet::new();

        for payment in payments.iter().filter(|p| p.is_monthly_donation_for(donor_id)) {
            match MonthLabel::parse(&payment.month) {
                Ok(month) => {
                    if !scan.paid.insert(month) {
                        duplicates.insert(month);
                    }
                }
                Err(_) => scan.unrecognized_labels.push(payment.month.clone()),
            }
        }

        scan.duplicate_months = duplicates.into_iter().collect();
        scan
    }

    /// Months with a monthly-donation payment on record, ascending and unique.
    pub fn paid_months(&self, donor_id: &str, payments: &[Payment]) -> Vec<MonthLabel> {
        self.scan_payments(donor_id, payments).paid.into_iter().collect()
    }

    /// Owed months without a matching payment, ascending.
    pub fn missing_months(
        &self,
        donor: &Donor,
        payments: &[Payment],
        today: NaiveDate,
    ) -> Result<Vec<MonthLabel>> {
        let paid = self.scan_payments(&donor.id, payments).paid;

        Ok(self
            .obligation_months(donor, today)?
            .into_iter()
            .filter(|month| !paid.contains(month))
            .collect())
    }

    /// Full picture for one donor: obligations, paid, missing and anomalies.
    pub fn reconcile(
        &self,
        donor: &Donor,
        payments: &[Payment],
        today: NaiveDate,
    ) -> Result<DonorReconciliation> {
        let obligation = self.obligation_months(donor, today)?;
        let scan = self.scan_payments(&donor.id, payments);

        let (paid, missing): (Vec<MonthLabel>, Vec<MonthLabel>) = obligation
            .iter()
            .copied()
            .partition(|month| scan.paid.contains(month));

        let owed: BTreeSet<MonthLabel> = obligation.iter().copied().collect();
        let advance = scan
            .paid
            .iter()
            .filter(|month| !owed.contains(month))
            .copied()
            .collect();

        Ok(DonorReconciliation {
            donor_id: donor.id.clone(),
            donor_name: donor.name.clone(),
            monthly_amount: donor.monthly_amount,
            as_of: today,
            total_due: total_due(donor.monthly_amount, missing.len()),
            obligation,
            paid,
            missing,
            advance,
            unrecognized_labels: scan.unrecognized_labels,
            duplicate_months: scan.duplicate_months,
        })
    }
}

impl Default for ReconciliationEngine {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::IncomeSource;
    use chrono::{Datelike, Months};
    use proptest::prelude::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn create_test_donor(start: NaiveDate, amount: f64) -> Donor {
        Donor::new("Test Donor", "0300-1234567", "Masjid Road", amount, start).with_id("donor-1")
    }

    fn pay(month: &str) -> Payment {
        Payment::monthly("donor-1", month, 500.0, date(2024, 1, 1))
    }

    fn labels(months: &[MonthLabel]) -> Vec<String> {
        months.iter().map(|m| m.label()).collect()
    }

    #[test]
    fn test_concrete_scenario() {
        let engine = ReconciliationEngine::new();
        let donor = create_test_donor(date(2024, 1, 15), 500.0);
        let payments = vec![pay("January 2024"), pay("March 2024")];
        let today = date(2024, 4, 10);

        let missing = engine.missing_months(&donor, &payments, today).unwrap();
        assert_eq!(labels(&missing), vec!["February 2024", "April 2024"]);

        let paid = engine.paid_months(&donor.id, &payments);
        assert_eq!(labels(&paid), vec!["January 2024", "March 2024"]);

        let report = engine.reconcile(&donor, &payments, today).unwrap();
        assert_eq!(report.total_due, 2.0 * 500.0);
        assert!(!report.is_settled());

        println!("✅ Test passed: {}", report.summary());
    }

    #[test]
    fn test_future_start_date_owes_nothing() {
        let engine = ReconciliationEngine::new();
        let today = date(2024, 4, 10);

        let next_year = create_test_donor(date(2025, 1, 1), 500.0);
        assert!(engine.missing_months(&next_year, &[], today).unwrap().is_empty());

        // Later this month still counts as "after today"
        let later_this_month = create_test_donor(date(2024, 4, 20), 500.0);
        assert!(engine.missing_months(&later_this_month, &[], today).unwrap().is_empty());
    }

    #[test]
    fn test_start_in_current_month() {
        let engine = ReconciliationEngine::new();
        let donor = create_test_donor(date(2024, 4, 1), 500.0);
        let today = date(2024, 4, 10);

        let missing = engine.missing_months(&donor, &[], today).unwrap();
        assert_eq!(labels(&missing), vec!["April 2024"]);

        let settled = engine
            .missing_months(&donor, &[pay("April 2024")], today)
            .unwrap();
        assert!(settled.is_empty());
    }

    #[test]
    fn test_full_history_without_payments() {
        let engine = ReconciliationEngine::new();
        let donor = create_test_donor(date(2023, 11, 30), 500.0);

        let missing = engine.missing_months(&donor, &[], date(2024, 2, 1)).unwrap();
        assert_eq!(
            labels(&missing),
            vec!["November 2023", "December 2023", "January 2024", "February 2024"]
        );
    }

    #[test]
    fn test_duplicates_give_no_extra_credit() {
        let engine = ReconciliationEngine::new();
        let donor = create_test_donor(date(2024, 1, 1), 500.0);
        let payments = vec![pay("January 2024"), pay("january 2024"), pay("January 2024")];

        let report = engine.reconcile(&donor, &payments, date(2024, 2, 15)).unwrap();
        assert_eq!(labels(&report.paid), vec!["January 2024"]);
        assert_eq!(labels(&report.missing), vec!["February 2024"]);
        assert_eq!(labels(&report.duplicate_months), vec!["January 2024"]);
    }

    #[test]
    fn test_label_format_sensitivity() {
        let engine = ReconciliationEngine::new();
        let donor = create_test_donor(date(2024, 1, 1), 500.0);
        let today = date(2024, 3, 5);

        // Same months written differently still match
        let variants = vec![pay("JANUARY 2024"), pay("Feb 2024"), pay("2024-03")];
        assert!(engine.missing_months(&donor, &variants, today).unwrap().is_empty());

        // A foreign-locale label satisfies nothing and is reported
        let foreign = vec![pay("Janvier 2024")];
        let report = engine.reconcile(&donor, &foreign, today).unwrap();
        assert!(report.paid.is_empty());
        assert_eq!(report.missing.len(), 3);
        assert_eq!(report.unrecognized_labels, vec!["Janvier 2024".to_string()]);
        assert!(engine.paid_months(&donor.id, &foreign).is_empty());
    }

    #[test]
    fn test_other_sources_and_donors_are_ignored() {
        let engine = ReconciliationEngine::new();
        let donor = create_test_donor(date(2024, 1, 1), 500.0);

        let mut gift = pay("January 2024");
        gift.source = IncomeSource::OneTimeGift;
        let other_donor = Payment::monthly("donor-2", "January 2024", 500.0, date(2024, 1, 3));

        let missing = engine
            .missing_months(&donor, &[gift, other_donor], date(2024, 1, 20))
            .unwrap();
        assert_eq!(labels(&missing), vec!["January 2024"]);
    }

    #[test]
    fn test_advance_payments_are_separated() {
        let engine = ReconciliationEngine::new();
        let donor = create_test_donor(date(2024, 2, 1), 500.0);
        let payments = vec![pay("January 2024"), pay("February 2024"), pay("June 2024")];

        let report = engine.reconcile(&donor, &payments, date(2024, 3, 1)).unwrap();
        assert_eq!(labels(&report.paid), vec!["February 2024"]);
        assert_eq!(labels(&report.missing), vec!["March 2024"]);
        assert_eq!(labels(&report.advance), vec!["January 2024", "June 2024"]);
    }

    #[test]
    fn test_span_guard() {
        let engine = ReconciliationEngine::with_max_span(12);
        let donor = create_test_donor(date(2020, 1, 1), 500.0);

        let err = engine.missing_months(&donor, &[], date(2024, 1, 1)).unwrap_err();
        assert!(matches!(
            err,
            DuesError::ObligationSpanTooLong { months: 49, max: 12, .. }
        ));

        // Exactly at the limit is accepted
        let at_limit = create_test_donor(date(2023, 2, 1), 500.0);
        assert_eq!(
            engine.missing_months(&at_limit, &[], date(2024, 1, 1)).unwrap().len(),
            12
        );
    }

    #[test]
    fn test_idempotent() {
        let engine = ReconciliationEngine::new();
        let donor = create_test_donor(date(2023, 6, 10), 500.0);
        let payments = vec![pay("July 2023"), pay("December 2023")];
        let today = date(2024, 4, 10);

        let first = engine.missing_months(&donor, &payments, today).unwrap();
        let second = engine.missing_months(&donor, &payments, today).unwrap();
        assert_eq!(first, second);
    }

    proptest! {
        #[test]
        fn prop_missing_and_paid_partition_obligation(
            months_back in 0u32..120,
            start_day in 1u32..=28,
            paid_mask in proptest::collection::vec(any::<bool>(), 120),
        ) {
            let engine = ReconciliationEngine::new();
            // Last allowed start day, so a current-month start is never in the future
            let today = date(2024, 4, 28);
            let start_month = date(2024, 4, 1)
                .checked_sub_months(Months::new(months_back))
                .unwrap();
            let donor = create_test_donor(start_month.with_day(start_day).unwrap(), 500.0);

            let mut payments = Vec::new();
            let mut month = MonthLabel::from_date(start_month);
            for offset in 0..=months_back {
                if paid_mask[offset as usize] {
                    payments.push(pay(&month.label()));
                }
                month = month.next().unwrap();
            }

            let obligation = engine.obligation_months(&donor, today).unwrap();
            let missing = engine.missing_months(&donor, &payments, today).unwrap();
            let paid = engine.paid_months(&donor.id, &payments);

            prop_assert_eq!(obligation.len() as u32, months_back + 1);
            prop_assert!(missing.windows(2).all(|w| w[0] < w[1]));
            prop_assert!(missing.iter().all(|m| !paid.contains(m)));

            let mut union: Vec<MonthLabel> = missing.iter().chain(paid.iter()).copied().collect();
            union.sort();
            prop_assert_eq!(union, obligation);
        }

        #[test]
        fn prop_no_payments_means_full_history(months_back in 0u32..240) {
            let engine = ReconciliationEngine::new();
            let today = date(2024, 4, 10);
            let start = date(2024, 4, 1).checked_sub_months(Months::new(months_back)).unwrap();
            let donor = create_test_donor(start, 500.0);

            let missing = engine.missing_months(&donor, &[], today).unwrap();
            prop_assert_eq!(missing.len() as u32, months_back + 1);
            prop_assert_eq!(missing.first().copied(), Some(MonthLabel::from_date(start)));
            prop_assert_eq!(missing.last().copied(), Some(MonthLabel::from_date(today)));
        }
    }
}
