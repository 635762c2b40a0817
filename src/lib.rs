// Mosque Dues - Core Library
// Missing-payment reconciliation for monthly donation pledges.
// Exposes all modules for use in the CLI, API server, and tests.

pub mod clock;
pub mod config;
pub mod data_quality;
pub mod db;
pub mod dues;
pub mod entities;
pub mod errors;
pub mod month_label;
pub mod notices;
pub mod reconciliation;
pub mod repository;
pub mod service;
pub mod status;

// Re-export commonly used types
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::DuesConfig;
pub use data_quality::{
    BatchSummary, DataQualityEngine, QualityIssue, QualityReport, Severity, ValidationResult,
};
pub use db::{
    get_all_payments, get_donor, get_events_for_entity, get_payments_for_donor, insert_donors,
    insert_event, insert_payments, load_all_donors, load_donors_csv, load_income_csv,
    setup_database, update_donor_status, verify_counts, Event, ImportCounts, SqliteRepository,
};
pub use dues::{total_due, DuesReport, DuesRow};
pub use entities::{
    Donor, DonorRegistry, DonorStatus, IncomeSource, Payment, PaymentLedger, MONTHLY_DONATION_TAG,
};
pub use errors::{DuesError, Result};
pub use month_label::MonthLabel;
pub use notices::{Notice, NoticeGenerator};
pub use reconciliation::{DonorReconciliation, PaymentScan, ReconciliationEngine};
pub use repository::{DonorBatch, DonorRepository, InMemoryRepository, SkippedDonor};
pub use service::{DuesService, ReconciledDonors};
pub use status::{StatusAuditEntry, StatusPolicy};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
