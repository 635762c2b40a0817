// 🤲 Donor Entity - a subscriber with a monthly pledge
//
// "Donor name is a VALUE (can change), Donor id is IDENTITY (never changes)"
//
// Edits append a new version to the registry; older versions are kept with
// `valid_until` set so the pledge history stays queryable.

use crate::errors::{DuesError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock};

// ============================================================================
// DONOR STATUS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DonorStatus {
    Active,
    Inactive,
    Defaulter,
}

impl DonorStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DonorStatus::Active => "Active",
            DonorStatus::Inactive => "Inactive",
            DonorStatus::Defaulter => "Defaulter",
        }
    }

    pub fn parse(raw: &str) -> Result<DonorStatus> {
        match raw.trim().to_lowercase().as_str() {
            "active" | "" => Ok(DonorStatus::Active),
            "inactive" => Ok(DonorStatus::Inactive),
            "defaulter" => Ok(DonorStatus::Defaulter),
            other => Err(DuesError::InvalidRecord(format!(
                "Unknown donor status: {}",
                other
            ))),
        }
    }
}

// ============================================================================
// DONOR ENTITY
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Donor {
    /// Stable identity - NEVER changes
    pub id: String,

    pub name: String,
    pub phone: String,
    pub address: String,

    /// Pledged amount per calendar month
    pub monthly_amount: f64,

    /// Stored status, edited by hand (see `status::StatusPolicy` for the derived suggestion)
    pub status: DonorStatus,

    /// First month the donor is liable for is the month of this date
    pub start_date: NaiveDate,

    // ========================================================================
    // VERSIONING
    // ========================================================================
    pub version: i64,
    pub valid_from: DateTime<Utc>,
    pub valid_until: Option<DateTime<Utc>>,
}

impl Donor {
    /// Create new donor with a fresh UUID
    pub fn new(
        name: impl Into<String>,
        phone: impl Into<String>,
        address: impl Into<String>,
        monthly_amount: f64,
        start_date: NaiveDate,
    ) -> Self {
        Donor {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            phone: phone.into(),
            address: address.into(),
            monthly_amount,
            status: DonorStatus::Active,
            start_date,
            version: 1,
            valid_from: Utc::now(),
            valid_until: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_status(mut self, status: DonorStatus) -> Self {
        self.status = status;
        self
    }

    pub fn is_current(&self) -> bool {
        self.valid_until.is_none()
    }

    pub fn is_active(&self) -> bool {
        self.status != DonorStatus::Inactive
    }
}

/// Parse a stored or imported start date.
///
/// Accepts `YYYY-MM-DD` and RFC 3339 timestamps (the date part is used).
pub fn parse_start_date(donor_id: &str, raw: &str) -> Result<NaiveDate> {
    let trimmed = raw.trim();

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(date);
    }

    if let Ok(timestamp) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(timestamp.date_naive());
    }

    Err(DuesError::InvalidStartDate {
        donor_id: donor_id.to_string(),
        value: raw.to_string(),
    })
}

// ============================================================================
// DONOR REGISTRY
// ============================================================================

/// In-memory store of all donor versions (append-only).
#[derive(Clone, Default)]
pub struct DonorRegistry {
    versions: Arc<RwLock<Vec<Donor>>>,
}

impl DonorRegistry {
    pub fn new() -> Self {
        DonorRegistry {
            versions: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Register a donor version
    pub fn register(&self, donor: Donor) {
        let mut versions = self.versions.write().unwrap_or_else(PoisonError::into_inner);
        versions.push(donor);
    }

    pub fn get_current_version(&self, id: &str) -> Option<Donor> {
        let versions = self.versions.read().unwrap_or_else(PoisonError::into_inner);
        versions
            .iter()
            .find(|d| d.id == id && d.is_current())
            .cloned()
    }

    /// Current versions of every donor, ordered by name
    pub fn all_donors(&self) -> Vec<Donor> {
        let versions = self.versions.read().unwrap_or_else(PoisonError::into_inner);
        let mut current: Vec<Donor> = versions.iter().filter(|d| d.is_current()).cloned().collect();
        current.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        current
    }
}

// ============================================================================
// TESTS
// ============================================================================
