// ❗ Error types for the dues engine
//
// Library code returns `DuesError`; the binaries wrap it in `anyhow` with context.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DuesError>;

#[derive(Debug, Error)]
pub enum DuesError {
    #[error("Donor not found: {0}")]
    DonorNotFound(String),

    #[error("Invalid start date '{value}' for donor {donor_id}")]
    InvalidStartDate { donor_id: String, value: String },

    #[error("Unrecognized month label: '{0}'")]
    InvalidMonthLabel(String),

    #[error(
        "Obligation span of {months} months for donor {donor_id} exceeds the limit of {max} months"
    )]
    ObligationSpanTooLong {
        donor_id: String,
        months: u32,
        max: u32,
    },

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Import error: {0}")]
    Import(#[from] csv::Error),
}

impl DuesError {
    /// True for errors caused by bad data on a record rather than by storage.
    pub fn is_data_error(&self) -> bool {
        matches!(
            self,
            DuesError::InvalidStartDate { .. }
                | DuesError::InvalidMonthLabel(_)
                | DuesError::ObligationSpanTooLong { .. }
                | DuesError::InvalidRecord(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = DuesError::DonorNotFound("d-1".to_string());
        assert_eq!(err.to_string(), "Donor not found: d-1");

        let err = DuesError::ObligationSpanTooLong {
            donor_id: "d-2".to_string(),
            months: 1300,
            max: 600,
        };
        assert!(err.to_string().contains("1300 months"));
        assert!(err.is_data_error());
    }

    #[test]
    fn test_not_found_is_not_data_error() {
        assert!(!DuesError::DonorNotFound("x".to_string()).is_data_error());
        assert!(DuesError::InvalidMonthLabel("Janvier 2024".to_string()).is_data_error());
    }
}
