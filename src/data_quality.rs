// ✅ Data Quality Engine - checks donor and payment records before they are trusted
//
// Every rule yields a ValidationResult; failures become QualityIssues with a
// recommendation. Reports are per record, with a batch summary on top.

use crate::entities::{Donor, Payment};
use crate::month_label::MonthLabel;
use crate::reconciliation::DEFAULT_MAX_SPAN_MONTHS;
use crate::repository::{DonorBatch, SkippedDonor};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

// ============================================================================
// VALIDATION RESULT
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub passed: bool,
    pub rule_name: String,
    pub field: String,
    pub message: String,
    pub severity: Severity,
}

impl ValidationResult {
    pub fn pass(rule_name: &str, field: &str, message: &str) -> Self {
        ValidationResult {
            passed: true,
            rule_name: rule_name.to_string(),
            field: field.to_string(),
            message: message.to_string(),
            severity: Severity::Info,
        }
    }

    pub fn fail(rule_name: &str, field: &str, message: &str, severity: Severity) -> Self {
        ValidationResult {
            passed: false,
            rule_name: rule_name.to_string(),
            field: field.to_string(),
            message: message.to_string(),
            severity,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Critical, // Record cannot be reconciled as-is
    Warning,  // Record is usable but questionable
    Info,
}

// ============================================================================
// QUALITY REPORT
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityIssue {
    pub severity: Severity,
    pub field: String,
    pub issue: String,
    pub recommendation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityReport {
    /// "donor" or "payment"
    pub record_type: String,
    pub record_id: String,
    pub validations: Vec<ValidationResult>,
    pub issues: Vec<QualityIssue>,
    pub passed_count: usize,
    pub failed_count: usize,
}

impl QualityReport {
    fn new(record_type: &str, record_id: &str) -> Self {
        QualityReport {
            record_type: record_type.to_string(),
            record_id: record_id.to_string(),
            validations: Vec::new(),
            issues: Vec::new(),
            passed_count: 0,
            failed_count: 0,
        }
    }

    fn add(&mut self, result: ValidationResult, recommendation: &str) {
        if result.passed {
            self.passed_count += 1;
        } else {
            self.failed_count += 1;
            self.issues.push(QualityIssue {
                severity: result.severity,
                field: result.field.clone(),
                issue: result.message.clone(),
                recommendation: recommendation.to_string(),
            });
        }
        self.validations.push(result);
    }

    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn has_critical_issues(&self) -> bool {
        self.issues.iter().any(|i| i.severity == Severity::Critical)
    }

    pub fn summary(&self) -> String {
        format!(
            "{} {}: {} passed, {} failed ({} critical)",
            self.record_type,
            self.record_id,
            self.passed_count,
            self.failed_count,
            self.issues
                .iter()
                .filter(|i| i.severity == Severity::Critical)
                .count()
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total_records: usize,
    pub clean_count: usize,
    pub critical_count: usize,
    pub warning_count: usize,
}

impl BatchSummary {
    pub fn summary(&self) -> String {
        format!(
            "{} records: {} clean, {} with critical issues, {} warnings",
            self.total_records, self.clean_count, self.critical_count, self.warning_count
        )
    }
}

// ============================================================================
// DATA QUALITY ENGINE
// ============================================================================

pub struct DataQualityEngine {
    /// Start dates spanning more months than this are flagged as implausible
    max_span_months: u32,
}

impl DataQualityEngine {
    pub fn new() -> Self {
        DataQualityEngine {
            max_span_months: DEFAULT_MAX_SPAN_MONTHS,
        }
    }

    pub fn with_max_span(max_span_months: u32) -> Self {
        DataQualityEngine { max_span_months }
    }

    pub fn validate_donor(&self, donor: &Donor, today: NaiveDate) -> QualityReport {
        let mut report = QualityReport::new("donor", &donor.id);

        report.add(
            self.validate_name(&donor.name),
            "Record the donor's name as it appears on receipts",
        );
        report.add(
            self.validate_monthly_amount(donor.monthly_amount),
            "Set a positive monthly pledge",
        );
        report.add(
            self.validate_start_date(donor.start_date, today),
            "Correct the subscription start date",
        );
        report.add(
            self.validate_phone(&donor.phone),
            "Add a phone number so notices can be delivered",
        );

        report
    }

    /// Validate one payment against the set of known donor ids.
    pub fn validate_payment(
        &self,
        payment: &Payment,
        known_donors: &HashSet<String>,
    ) -> QualityReport {
        let mut report = QualityReport::new("payment", &payment.id);

        report.add(
            self.validate_amount(payment.amount),
            "Verify the amount on the receipt",
        );

        if payment.source.is_monthly_donation() {
            report.add(
                self.validate_month_label(&payment.month),
                "Write the month as e.g. \"January 2024\"",
            );
            report.add(
                self.validate_donor_reference(payment.donor_id.as_deref(), known_donors),
                "Link the payment to a registered donor",
            );
        }

        report
    }

    /// Flag monthly donations paid more than once for the same donor and month.
    pub fn find_duplicate_payments(&self, payments: &[Payment]) -> Vec<QualityIssue> {
        let mut seen: HashMap<(String, MonthLabel), usize> = HashMap::new();

        for payment in payments.iter().filter(|p| p.source.is_monthly_donation()) {
            let donor_id = payment.donor_id.as_ref();
            if let (Some(donor_id), Some(month)) = (donor_id, payment.month_label()) {
                *seen.entry((donor_id.clone(), month)).or_insert(0) += 1;
            }
        }

        let mut duplicates: Vec<((String, MonthLabel), usize)> =
            seen.into_iter().filter(|(_, count)| *count > 1).collect();
        duplicates.sort_by(|a, b| a.0.cmp(&b.0));

        duplicates
            .into_iter()
            .map(|((donor_id, month), count)| QualityIssue {
                severity: Severity::Warning,
                field: "month".to_string(),
                issue: format!("Donor {} has {} payments for {}", donor_id, count, month),
                recommendation: "Check whether one payment belongs to another month".to_string(),
            })
            .collect()
    }

    /// Report for a stored donor row that could not be loaded at all.
    pub fn validate_rejected_donor(&self, skipped: &SkippedDonor) -> QualityReport {
        let mut report = QualityReport::new("donor", &skipped.donor_id);
        report.add(
            ValidationResult::fail(
                "record_loadable",
                "start_date",
                &skipped.reason,
                Severity::Critical,
            ),
            "Fix the stored record (start date as YYYY-MM-DD) and re-import",
        );
        report
    }

    pub fn validate_all(
        &self,
        batch: &DonorBatch,
        payments: &[Payment],
        today: NaiveDate,
    ) -> Vec<QualityReport> {
        // Payments for a rejected donor still reference a real record
        let known: HashSet<String> = batch
            .donors
            .iter()
            .map(|d| d.id.clone())
            .chain(batch.skipped.iter().map(|s| s.donor_id.clone()))
            .collect();

        batch
            .donors
            .iter()
            .map(|d| self.validate_donor(d, today))
            .chain(batch.skipped.iter().map(|s| self.validate_rejected_donor(s)))
            .chain(payments.iter().map(|p| self.validate_payment(p, &known)))
            .collect()
    }

    pub fn batch_summary(&self, reports: &[QualityReport]) -> BatchSummary {
        BatchSummary {
            total_records: reports.len(),
            clean_count: reports.iter().filter(|r| r.is_clean()).count(),
            critical_count: reports.iter().filter(|r| r.has_critical_issues()).count(),
            warning_count: reports
                .iter()
                .flat_map(|r| r.issues.iter())
                .filter(|i| i.severity == Severity::Warning)
                .count(),
        }
    }

    // ========================================================================
    // VALIDATION RULES
    // ========================================================================

    fn validate_name(&self, name: &str) -> ValidationResult {
        if name.trim().is_empty() {
            return ValidationResult::fail(
                "name_not_empty",
                "name",
                "Donor name is empty",
                Severity::Critical,
            );
        }
        ValidationResult::pass("name_not_empty", "name", "Name present")
    }

    fn validate_monthly_amount(&self, amount: f64) -> ValidationResult {
        if !amount.is_finite() || amount <= 0.0 {
            return ValidationResult::fail(
                "monthly_amount_positive",
                "monthly_amount",
                &format!("Monthly amount must be positive, got {}", amount),
                Severity::Critical,
            );
        }
        ValidationResult::pass("monthly_amount_positive", "monthly_amount", "Pledge is positive")
    }

    fn validate_start_date(&self, start: NaiveDate, today: NaiveDate) -> ValidationResult {
        let span = MonthLabel::from_date(start).months_through(&MonthLabel::from_date(today));

        if span > self.max_span_months {
            return ValidationResult::fail(
                "start_date_plausible",
                "start_date",
                &format!("Start date {} is {} months ago", start, span),
                Severity::Critical,
            );
        }

        if start > today {
            return ValidationResult::fail(
                "start_date_not_future",
                "start_date",
                &format!("Start date {} is in the future", start),
                Severity::Info,
            );
        }

        ValidationResult::pass("start_date_plausible", "start_date", "Start date plausible")
    }

    fn validate_phone(&self, phone: &str) -> ValidationResult {
        if phone.trim().is_empty() {
            return ValidationResult::fail(
                "phone_present",
                "phone",
                "No phone number",
                Severity::Warning,
            );
        }
        ValidationResult::pass("phone_present", "phone", "Phone present")
    }

    fn validate_amount(&self, amount: f64) -> ValidationResult {
        if !amount.is_finite() || amount <= 0.0 {
            return ValidationResult::fail(
                "amount_positive",
                "amount",
                &format!("Payment amount must be positive, got {}", amount),
                Severity::Warning,
            );
        }
        ValidationResult::pass("amount_positive", "amount", "Amount is positive")
    }

    fn validate_month_label(&self, month: &str) -> ValidationResult {
        match MonthLabel::parse(month) {
            Ok(label) => ValidationResult::pass(
                "month_label_recognized",
                "month",
                &format!("Month recognized as {}", label),
            ),
            Err(_) => ValidationResult::fail(
                "month_label_recognized",
                "month",
                &format!(
                    "Month label '{}' is not recognized; it will not count as paid",
                    month
                ),
                Severity::Critical,
            ),
        }
    }

    fn validate_donor_reference(
        &self,
        donor_id: Option<&str>,
        known_donors: &HashSet<String>,
    ) -> ValidationResult {
        match donor_id {
            None | Some("") => ValidationResult::fail(
                "donor_reference",
                "donor_id",
                "Monthly donation has no donor",
                Severity::Critical,
            ),
            Some(id) if !known_donors.contains(id) => ValidationResult::fail(
                "donor_reference",
                "donor_id",
                &format!("Unknown donor: {}", id),
                Severity::Critical,
            ),
            Some(_) => ValidationResult::pass("donor_reference", "donor_id", "Donor known"),
        }
    }
}

impl Default for DataQualityEngine {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================
