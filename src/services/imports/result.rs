use crate::errors::ServiceError;
use serde::{Deserialize, Serialize};

pub const DETECTION_FAILED_MESSAGE: &str =
    "Unable to detect CSV format. Please use the products, inventory, or orders template.";
pub const NO_VALID_ROWS_MESSAGE: &str = "No valid rows found";

/// The only value an import reports back to its caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResult {
    pub success: bool,
    pub total_rows: usize,
    pub successful_rows: usize,
    pub failed_rows: usize,
    pub errors: Vec<String>,
}

/// What the batch importer managed to persist
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistenceOutcome {
    pub successful_rows: usize,
    /// Rows for products and inventory; customer groups for orders
    pub failed_rows: usize,
    pub errors: Vec<String>,
}

impl ImportResult {
    /// Merges validation and persistence results, validation errors first.
    ///
    /// Rows rejected during validation always count as failed.
    pub fn aggregate(
        total_rows: usize,
        accepted_rows: usize,
        validation_errors: Vec<String>,
        outcome: PersistenceOutcome,
    ) -> Self {
        let rejected_rows = total_rows.saturating_sub(accepted_rows);
        let mut errors = validation_errors;
        errors.extend(outcome.errors);

        Self {
            success: outcome.successful_rows > 0,
            total_rows,
            successful_rows: outcome.successful_rows,
            failed_rows: rejected_rows + outcome.failed_rows,
            errors,
        }
    }

    pub fn detection_failed(total_rows: usize) -> Self {
        Self::failed(total_rows, vec![DETECTION_FAILED_MESSAGE.to_string()])
    }

    /// Every row was rejected during validation
    pub fn no_valid_rows(total_rows: usize, validation_errors: Vec<String>) -> Self {
        let errors = if validation_errors.is_empty() {
            vec![NO_VALID_ROWS_MESSAGE.to_string()]
        } else {
            validation_errors
        };
        Self::failed(total_rows, errors)
    }

    /// A fatal error before any row was processed
    pub fn processing_error(error: &ServiceError) -> Self {
        Self::failed(0, vec![format!("Processing error: {}", error.public_detail())])
    }

    fn failed(total_rows: usize, errors: Vec<String>) -> Self {
        Self {
            success: false,
            total_rows,
            successful_rows: 0,
            failed_rows: total_rows,
            errors,
        }
    }
}
