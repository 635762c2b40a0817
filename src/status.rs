// 🚦 Donor Status Policy
//
// The stored `Donor.status` is edited by hand and stays authoritative. This
// module derives the status the payment record suggests and lists the donors
// where the two disagree, so an operator can apply the change explicitly.

use crate::entities::{Donor, DonorStatus};
use serde::Serialize;

pub const DEFAULT_DEFAULTER_THRESHOLD: usize = 3;

#[derive(Debug, Clone, Copy)]
pub struct StatusPolicy {
    /// A donor with more missing months than this is a defaulter
    pub defaulter_threshold: usize,
}

impl StatusPolicy {
    pub fn new(defaulter_threshold: usize) -> Self {
        StatusPolicy { defaulter_threshold }
    }

    /// Status implied by the missing-month count. Inactive donors stay inactive.
    pub fn suggest(&self, stored: DonorStatus, missing_count: usize) -> DonorStatus {
        match stored {
            DonorStatus::Inactive => DonorStatus::Inactive,
            _ if missing_count > self.defaulter_threshold => DonorStatus::Defaulter,
            _ => DonorStatus::Active,
        }
    }

    pub fn audit(&self, donor: &Donor, missing_count: usize) -> StatusAuditEntry {
        StatusAuditEntry {
            donor_id: donor.id.clone(),
            donor_name: donor.name.clone(),
            stored: donor.status,
            suggested: self.suggest(donor.status, missing_count),
            missing_count,
        }
    }
}

impl Default for StatusPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_DEFAULTER_THRESHOLD)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusAuditEntry {
    pub donor_id: String,
    pub donor_name: String,
    pub stored: DonorStatus,
    pub suggested: DonorStatus,
    pub missing_count: usize,
}

impl StatusAuditEntry {
    pub fn is_mismatch(&self) -> bool {
        self.stored != self.suggested
    }
}
