// 💵 Payment Entity - an income entry
//
// Only entries whose source is the monthly donation take part in
// reconciliation. Gifts and box collections are kept in the same ledger.

use crate::month_label::MonthLabel;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::{Arc, PoisonError, RwLock};

pub const MONTHLY_DONATION_TAG: &str = "Monthly Donation";

// ============================================================================
// INCOME SOURCE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IncomeSource {
    MonthlyDonation,
    OneTimeGift,
    BoxCollection,
    Other(String),
}

impl IncomeSource {
    pub fn as_str(&self) -> &str {
        match self {
            IncomeSource::MonthlyDonation => MONTHLY_DONATION_TAG,
            IncomeSource::OneTimeGift => "One-time Gift",
            IncomeSource::BoxCollection => "Box Collection",
            IncomeSource::Other(name) => name,
        }
    }

    /// Map a stored source tag onto a variant (case-insensitive).
    pub fn parse(raw: &str) -> IncomeSource {
        let trimmed = raw.trim();
        match trimmed.to_lowercase().as_str() {
            "monthly donation" => IncomeSource::MonthlyDonation,
            "one-time gift" | "one time gift" => IncomeSource::OneTimeGift,
            "box collection" => IncomeSource::BoxCollection,
            _ => IncomeSource::Other(trimmed.to_string()),
        }
    }

    pub fn is_monthly_donation(&self) -> bool {
        matches!(self, IncomeSource::MonthlyDonation)
    }
}

// ============================================================================
// PAYMENT
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: String,

    /// Donor the payment is credited to (gifts may have none)
    pub donor_id: Option<String>,

    pub source: IncomeSource,

    /// Obligation month as written on the receipt, not the transaction date
    pub month: String,

    pub amount: f64,
    pub date: NaiveDate,
}

impl Payment {
    /// Monthly donation for `month` by `donor_id`
    pub fn monthly(
        donor_id: impl Into<String>,
        month: impl Into<String>,
        amount: f64,
        date: NaiveDate,
    ) -> Self {
        Payment {
            id: uuid::Uuid::new_v4().to_string(),
            donor_id: Some(donor_id.into()),
            source: IncomeSource::MonthlyDonation,
            month: month.into(),
            amount,
            date,
        }
    }

    /// True when this entry is a monthly donation credited to `donor_id`
    pub fn is_monthly_donation_for(&self, donor_id: &str) -> bool {
        self.source.is_monthly_donation() && self.donor_id.as_deref() == Some(donor_id)
    }

    /// Parsed obligation month, if the label is recognized
    pub fn month_label(&self) -> Option<MonthLabel> {
        MonthLabel::parse(&self.month).ok()
    }

    /// Idempotency hash used to skip rows on re-import
    pub fn compute_idempotency_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(format!(
            "{}|{}|{}|{}|{}",
            self.donor_id.as_deref().unwrap_or(""),
            self.source.as_str(),
            self.month.trim(),
            self.amount,
            self.date
        ));
        format!("{:x}", hasher.finalize())
    }
}

// ============================================================================
// PAYMENT LEDGER
// ============================================================================

/// In-memory income ledger.
#[derive(Clone, Default)]
pub struct PaymentLedger {
    entries: Arc<RwLock<Vec<Payment>>>,
}

impl PaymentLedger {
    pub fn new() -> Self {
        PaymentLedger {
            entries: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn record(&self, payment: Payment) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.push(payment);
    }

    /// Monthly donations credited to one donor, in recorded order
    pub fn monthly_donations_for(&self, donor_id: &str) -> Vec<Payment> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .iter()
            .filter(|p| p.is_monthly_donation_for(donor_id))
            .cloned()
            .collect()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_income_source_parse() {
        assert_eq!(IncomeSource::parse("Monthly Donation"), IncomeSource::MonthlyDonation);
        assert_eq!(IncomeSource::parse(" monthly donation "), IncomeSource::MonthlyDonation);
        assert_eq!(IncomeSource::parse("Box Collection"), IncomeSource::BoxCollection);
        assert_eq!(
            IncomeSource::parse("Zakat"),
            IncomeSource::Other("Zakat".to_string())
        );
        assert_eq!(IncomeSource::MonthlyDonation.as_str(), MONTHLY_DONATION_TAG);
    }

    #[test]
    fn test_monthly_donation_filter() {
        let ledger = PaymentLedger::new();
        ledger.record(Payment::monthly("d1", "January 2024", 500.0, date(2024, 1, 5)));
        ledger.record(Payment::monthly("d2", "January 2024", 300.0, date(2024, 1, 6)));
        ledger.record(Payment {
            id: "gift".to_string(),
            donor_id: Some("d1".to_string()),
            source: IncomeSource::OneTimeGift,
            month: "January 2024".to_string(),
            amount: 1000.0,
            date: date(2024, 1, 7),
        });

        let d1 = ledger.monthly_donations_for("d1");
        assert_eq!(d1.len(), 1);
        assert_eq!(d1[0].amount, 500.0);
        assert!(ledger.monthly_donations_for("d3").is_empty());
    }

    #[test]
    fn test_month_label_lookup() {
        let payment = Payment::monthly("d1", "march 2024", 500.0, date(2024, 3, 2));
        assert_eq!(payment.month_label(), MonthLabel::new(2024, 3));

        let foreign = Payment::monthly("d1", "Mars 2024", 500.0, date(2024, 3, 2));
        assert_eq!(foreign.month_label(), None);
    }

    #[test]
    fn test_idempotency_hash_is_stable() {
        let payment = Payment::monthly("d1", "January 2024", 500.0, date(2024, 1, 5));
        let mut copy = payment.clone();
        copy.id = "different-id".to_string();

        assert_eq!(payment.compute_idempotency_hash(), copy.compute_idempotency_hash());
        assert_eq!(payment.compute_idempotency_hash().len(), 64);

        copy.amount = 501.0;
        assert_ne!(payment.compute_idempotency_hash(), copy.compute_idempotency_hash());
    }
}
