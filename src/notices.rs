// 📨 Dues Notices - plain-text reminders for donors with unpaid months

use crate::entities::Donor;
use crate::month_label::MonthLabel;
use crate::reconciliation::DonorReconciliation;
use chrono::NaiveDate;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notice {
    pub donor_id: String,
    pub donor_name: String,
    pub phone: String,
    pub missing_months: Vec<MonthLabel>,
    pub monthly_amount: f64,
    pub total_due: f64,
    pub issued_on: NaiveDate,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct NoticeGenerator {
    pub mosque_name: String,
    pub currency: String,

    /// Donors with fewer missing months than this get no notice
    pub min_missing_months: usize,
}

impl NoticeGenerator {
    pub fn new(mosque_name: impl Into<String>, currency: impl Into<String>) -> Self {
        NoticeGenerator {
            mosque_name: mosque_name.into(),
            currency: currency.into(),
            min_missing_months: 1,
        }
    }

    pub fn with_min_missing_months(mut self, min: usize) -> Self {
        self.min_missing_months = min.max(1);
        self
    }

    /// Build a notice, or None when the donor is below the threshold or inactive.
    pub fn notice_for(&self, donor: &Donor, rec: &DonorReconciliation) -> Option<Notice> {
        if !donor.is_active() || rec.missing_count() < self.min_missing_months {
            return None;
        }

        Some(Notice {
            donor_id: donor.id.clone(),
            donor_name: donor.name.clone(),
            phone: donor.phone.clone(),
            missing_months: rec.missing.clone(),
            monthly_amount: rec.monthly_amount,
            total_due: rec.total_due,
            issued_on: rec.as_of,
            message: self.render(donor, rec),
        })
    }

    fn render(&self, donor: &Donor, rec: &DonorReconciliation) -> String {
        let months = rec
            .missing
            .iter()
            .map(|m| m.label())
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            "{mosque}\nDues notice - {date}\n\nDear {name},\n\
             Our records show no monthly donation for {count} month(s): {months}.\n\
             Monthly pledge: {cur} {amount:.2}\n\
             Total due: {cur} {due:.2}\n\n\
             If you have already paid, please share the receipt with the committee.\n",
            mosque = self.mosque_name,
            date = rec.as_of.format("%Y-%m-%d"),
            name = donor.name,
            count = rec.missing_count(),
            months = months,
            cur = self.currency,
            amount = rec.monthly_amount,
            due = rec.total_due,
        )
    }
}
