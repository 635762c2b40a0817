// Entity Models
// Following the same split everywhere: stable identity, values that change,
// and an in-memory store for lookups.

pub mod donor;
pub mod payment;

pub use donor::{parse_start_date, Donor, DonorRegistry, DonorStatus};
pub use payment::{IncomeSource, Payment, PaymentLedger, MONTHLY_DONATION_TAG};
