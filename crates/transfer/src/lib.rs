//! Spreadsheet import and export for the product table.
//!
//! Import is two-phase: [`validate`] resolves every row without persisting
//! anything, and only a batch with zero row errors can be handed to
//! [`commit`], which writes it through a [`ProductStore`] in one unit.

use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared::{domain::Product, protocol::ImportSummary};
use thiserror::Error;
use tracing::{info, warn};

mod dataset;
mod export;
mod validate;

pub use dataset::{Cell, DataRow, Dataset};
pub use export::write_products;
pub use validate::{validate, RowError, ValidatedBatch, ValidatedRow};

pub const COL_ID: &str = "id";
pub const COL_NAME: &str = "name";
pub const COL_CATEGORY: &str = "category";
pub const COL_QUANTITY: &str = "quantity";

/// Column order of exported sheets; matches the product attribute order.
pub const COLUMNS: [&str; 4] = [COL_ID, COL_NAME, COL_CATEGORY, COL_QUANTITY];

pub const EXPORT_FILENAME: &str = "products.xlsx";
pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// How an imported row finds the existing product it updates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKey {
    /// The `id` column. Rows without an id are inserted.
    #[default]
    Id,
    /// The `name` column; the lowest-id product with that name is updated.
    Name,
}

impl FromStr for MatchKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "id" => Ok(MatchKey::Id),
            "name" => Ok(MatchKey::Name),
            other => Err(format!("unknown import match key '{other}', expected 'id' or 'name'")),
        }
    }
}

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("not a readable spreadsheet: {0}")]
    Malformed(String),
    #[error("{} row(s) had errors", .0.len())]
    InvalidRows(Vec<RowError>),
    #[error("store error: {0}")]
    Store(#[from] anyhow::Error),
    #[error("failed to write spreadsheet: {0}")]
    Write(#[from] rust_xlsxwriter::XlsxError),
}

/// Persistence seam for the adapter; the SQLite storage implements it.
#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn list_products(&self) -> anyhow::Result<Vec<Product>>;

    /// Applies every row of the batch or none of them.
    async fn apply_product_batch(&self, batch: &ValidatedBatch) -> anyhow::Result<ImportSummary>;
}

pub fn parse(bytes: &[u8]) -> Result<Dataset, TransferError> {
    if bytes.is_empty() {
        return Err(TransferError::Malformed("file is empty".to_string()));
    }
    Dataset::from_xlsx(bytes)
}

pub async fn commit<S>(store: &S, batch: ValidatedBatch) -> Result<ImportSummary, TransferError>
where
    S: ProductStore + ?Sized,
{
    let summary = store.apply_product_batch(&batch).await?;
    info!(
        key = ?batch.key(),
        inserted = summary.inserted,
        updated = summary.updated,
        "product import committed"
    );
    Ok(summary)
}

/// Parse, dry-run and, only if every row is valid, commit.
pub async fn import_products<S>(
    store: &S,
    bytes: &[u8],
    key: MatchKey,
) -> Result<ImportSummary, TransferError>
where
    S: ProductStore + ?Sized,
{
    let dataset = parse(bytes)?;
    let batch = validate(&dataset, key).map_err(|rows| {
        if let Some(first) = rows.first() {
            warn!(rejected = rows.len(), %first, "product import rejected");
        }
        TransferError::InvalidRows(rows)
    })?;
    commit(store, batch).await
}

pub async fn export_products<S>(store: &S) -> Result<Vec<u8>, TransferError>
where
    S: ProductStore + ?Sized,
{
    let products = store.list_products().await?;
    let bytes = write_products(&products)?;
    info!(rows = products.len(), bytes = bytes.len(), "product export written");
    Ok(bytes)
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
