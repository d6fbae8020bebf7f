/*!
 * # CSV Import Pipeline
 *
 * raw text -> parse -> detect -> permission gate -> resolve lookups ->
 * validate rows -> persist -> aggregate into an [`ImportResult`].
 *
 * Only parsing and the permission gate return `Err`; every other failure is
 * folded into the result.
 */

pub mod detect;
pub mod importer;
pub mod parser;
pub mod records;
pub mod resolver;
pub mod result;
pub mod store;
pub mod templates;
pub mod validator;

pub use detect::{detect, detect_headers, ImportRecordKind};
pub use importer::{generate_order_number, BatchImporter};
pub use parser::{normalize_header, parse_csv, ParsedCsv, RawRow};
pub use records::{AcceptedRecords, ConsolidatedOrder};
pub use resolver::{resolve, ReferenceLookups};
pub use result::{ImportResult, PersistenceOutcome};
pub use store::{ImportStore, SeaOrmImportStore};
pub use templates::template_for;
pub use validator::{validate, ValidationReport};

use crate::auth::{Actions, Resources, SessionContext};
use crate::config::ImportConfig;
use crate::errors::ServiceError;
use metrics::counter;
use std::sync::Arc;
use tracing::{error, info, instrument};

/// `(resource, action)` a caller needs to import records of `kind`
pub fn required_permission(kind: ImportRecordKind) -> Option<(&'static str, &'static str)> {
    match kind {
        ImportRecordKind::Products => Some((Resources::PRODUCTS, Actions::CREATE)),
        ImportRecordKind::Inventory => Some((Resources::INVENTORY, Actions::UPDATE)),
        ImportRecordKind::Orders => Some((Resources::ORDERS, Actions::CREATE)),
        ImportRecordKind::Unknown => None,
    }
}

/// Entry point for one import invocation
#[derive(Clone)]
pub struct ImportService {
    store: Arc<dyn ImportStore>,
    config: ImportConfig,
}

impl ImportService {
    pub fn new(store: Arc<dyn ImportStore>, config: ImportConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &ImportConfig {
        &self.config
    }

    /// Runs the whole pipeline for `csv_text` on behalf of `session`.
    ///
    /// # Errors
    /// `ParseError` when the text is not readable as CSV, `Forbidden` when the
    /// session may not import the detected kind.
    #[instrument(
        skip(self, session, csv_text),
        fields(user_id = %session.user_id, tenant_id = %session.tenant_id, bytes = csv_text.len())
    )]
    pub async fn import_csv(
        &self,
        session: &SessionContext,
        csv_text: &str,
    ) -> Result<ImportResult, ServiceError> {
        let parsed = parse_csv(csv_text)?;
        let kind = detect_headers(&parsed.headers);
        let total_rows = parsed.rows.len();

        let Some((resource, action)) = required_permission(kind) else {
            info!(total_rows, "Import rejected: unrecognized headers");
            record_run(kind, 0, total_rows);
            return Ok(ImportResult::detection_failed(total_rows));
        };
        session.require(resource, action)?;

        info!(%kind, total_rows, "Starting import");

        let lookups = match resolve(self.store.as_ref(), kind).await {
            Ok(lookups) => lookups,
            Err(err) => {
                error!(%kind, error = %err, "Import aborted while resolving references");
                record_run(kind, 0, 0);
                return Ok(ImportResult::processing_error(&err));
            }
        };

        let Some(report) = validate(&parsed.rows, kind, &lookups) else {
            return Ok(ImportResult::detection_failed(total_rows));
        };

        if report.accepted.is_empty() {
            info!(%kind, total_rows, "No rows passed validation");
            record_run(kind, 0, total_rows);
            return Ok(ImportResult::no_valid_rows(total_rows, report.errors));
        }

        let accepted_rows = report.accepted.len();
        let outcome = BatchImporter::new(self.store.clone(), self.config.clone())
            .import(report.accepted)
            .await;
        let result = ImportResult::aggregate(total_rows, accepted_rows, report.errors, outcome);

        info!(
            %kind,
            successful_rows = result.successful_rows,
            failed_rows = result.failed_rows,
            errors = result.errors.len(),
            "Import finished"
        );
        record_run(kind, result.successful_rows, result.failed_rows);

        Ok(result)
    }
}

fn record_run(kind: ImportRecordKind, succeeded: usize, failed: usize) {
    let kind = kind.to_string();
    counter!("stockroom_import.runs", 1, "kind" => kind.clone());
    counter!("stockroom_import.rows.succeeded", succeeded as u64, "kind" => kind.clone());
    counter!("stockroom_import.rows.failed", failed as u64, "kind" => kind);
}
