// 💰 Dues - what is owed, per donor and in total
//
// Flat rule: missing months × monthly pledge. No proration, no late fees.

use crate::reconciliation::DonorReconciliation;
use crate::repository::SkippedDonor;
use chrono::NaiveDate;
use serde::Serialize;

pub fn total_due(monthly_amount: f64, missing_count: usize) -> f64 {
    missing_count as f64 * monthly_amount
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuesRow {
    pub donor_id: String,
    pub donor_name: String,
    pub monthly_amount: f64,
    pub missing_count: usize,
    pub total_due: f64,
}

impl From<&DonorReconciliation> for DuesRow {
    fn from(rec: &DonorReconciliation) -> Self {
        DuesRow {
            donor_id: rec.donor_id.clone(),
            donor_name: rec.donor_name.clone(),
            monthly_amount: rec.monthly_amount,
            missing_count: rec.missing_count(),
            total_due: rec.total_due,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuesReport {
    pub generated_on: NaiveDate,
    pub rows: Vec<DuesRow>,

    /// Sum of dues over donors with at least one missing month
    pub total_outstanding: f64,
    pub donors_with_dues: usize,

    /// Donors left out of the totals because their records are unusable
    pub skipped: Vec<SkippedDonor>,
}

impl DuesReport {
    pub fn from_rows(generated_on: NaiveDate, rows: Vec<DuesRow>) -> Self {
        let (total_outstanding, donors_with_dues) = rows
            .iter()
            .filter(|row| row.missing_count > 0)
            .fold((0.0, 0), |(sum, count), row| (sum + row.total_due, count + 1));

        DuesReport {
            generated_on,
            rows,
            total_outstanding,
            donors_with_dues,
            skipped: Vec::new(),
        }
    }

    pub fn with_skipped(mut self, skipped: Vec<SkippedDonor>) -> Self {
        self.skipped = skipped;
        self
    }

    pub fn from_reconciliations(generated_on: NaiveDate, recs: &[DonorReconciliation]) -> Self {
        Self::from_rows(generated_on, recs.iter().map(DuesRow::from).collect())
    }

    /// Rows with something owed, largest amount first
    pub fn outstanding(&self) -> Vec<&DuesRow> {
        let mut rows: Vec<&DuesRow> = self.rows.iter().filter(|r| r.missing_count > 0).collect();
        rows.sort_by(|a, b| {
            b.total_due
                .partial_cmp(&a.total_due)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.donor_name.cmp(&b.donor_name))
        });
        rows
    }

    pub fn summary(&self) -> String {
        let mut summary = format!(
            "Dues as of {}: {} of {} donors owe, outstanding {:.2}",
            self.generated_on,
            self.donors_with_dues,
            self.rows.len(),
            self.total_outstanding
        );
        if !self.skipped.is_empty() {
            summary.push_str(&format!(" ({} donor(s) skipped)", self.skipped.len()));
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(name: &str, amount: f64, missing: usize) -> DuesRow {
        DuesRow {
            donor_id: name.to_lowercase(),
            donor_name: name.to_string(),
            monthly_amount: amount,
            missing_count: missing,
            total_due: total_due(amount, missing),
        }
    }

    #[test]
    fn test_total_due_formula() {
        assert_eq!(total_due(500.0, 3), 1500.0);
        assert_eq!(total_due(500.0, 0), 0.0);
        assert_eq!(total_due(250.0, 1), 250.0);
    }

    #[test]
    fn test_report_totals() {
        let today = NaiveDate::from_ymd_opt(2024, 4, 10).unwrap();
        let report = DuesReport::from_rows(
            today,
            vec![row("Aisha", 500.0, 3), row("Bilal", 300.0, 0), row("Umar", 200.0, 5)],
        );

        assert_eq!(report.total_outstanding, 2500.0);
        assert_eq!(report.donors_with_dues, 2);

        let names: Vec<&str> = report.outstanding().iter().map(|r| r.donor_name.as_str()).collect();
        assert_eq!(names, vec!["Aisha", "Umar"]);

        println!("✅ {}", report.summary());
    }

    #[test]
    fn test_empty_report() {
        let today = NaiveDate::from_ymd_opt(2024, 4, 10).unwrap();
        let report = DuesReport::from_rows(today, vec![]);
        assert_eq!(report.total_outstanding, 0.0);
        assert_eq!(report.donors_with_dues, 0);
        assert!(report.skipped.is_empty());
    }

    #[test]
    fn test_summary_mentions_skipped_donors() {
        let today = NaiveDate::from_ymd_opt(2024, 4, 10).unwrap();
        let report = DuesReport::from_rows(today, vec![row("Aisha", 500.0, 1)]).with_skipped(vec![
            SkippedDonor {
                donor_id: "x".to_string(),
                reason: "Invalid start date".to_string(),
            },
        ]);

        assert_eq!(report.total_outstanding, 500.0);
        assert!(report.summary().ends_with("(1 donor(s) skipped)"));
    }
}
