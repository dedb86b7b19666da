use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use shared::{
    domain::{NewProduct, ProductId},
    forms::{FieldErrors, ProductInput},
};

use crate::{dataset::Dataset, MatchKey, COL_CATEGORY, COL_ID, COL_NAME, COL_QUANTITY};

/// One rejected spreadsheet row from the dry run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowError {
    pub line: usize,
    pub errors: FieldErrors,
}

impl std::fmt::Display for RowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "row {}: {}", self.line, self.errors.summary())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRow {
    pub line: usize,
    /// Only populated when matching by id.
    pub id: Option<ProductId>,
    pub product: NewProduct,
}

/// Rows that all passed validation. Produced only by [`validate`], so holding
/// one means the dry run reported zero errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedBatch {
    key: MatchKey,
    rows: Vec<ValidatedRow>,
}

impl ValidatedBatch {
    pub fn key(&self) -> MatchKey {
        self.key
    }

    pub fn rows(&self) -> &[ValidatedRow] {
        &self.rows
    }

    /// Rows naming an explicit id come first, so an id-less insert can never
    /// be handed an id that a later row claims.
    pub fn rows_in_apply_order(&self) -> impl Iterator<Item = &ValidatedRow> {
        let (explicit, assigned): (Vec<_>, Vec<_>) =
            self.rows.iter().partition(|row| row.id.is_some());
        explicit.into_iter().chain(assigned)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Dry run: resolves every row into product attributes without touching a
/// store. Either every row is valid or every failing row is reported.
pub fn validate(dataset: &Dataset, key: MatchKey) -> Result<ValidatedBatch, Vec<RowError>> {
    let id_col = dataset.column(COL_ID);
    let name_col = dataset.column(COL_NAME);
    let category_col = dataset.column(COL_CATEGORY);
    let quantity_col = dataset.column(COL_QUANTITY);

    let mut rows = Vec::with_capacity(dataset.rows().len());
    let mut failures = Vec::new();
    let mut seen_ids = HashSet::new();
    let mut seen_names = HashSet::new();

    for row in dataset.rows() {
        let input = ProductInput {
            name: row.text(name_col),
            category: row.text(category_col),
            quantity: row.text(quantity_col),
        };
        let (product, mut errors) = match input.validate() {
            Ok(product) => (Some(product), FieldErrors::default()),
            Err(errors) => (None, errors),
        };

        let id = match key {
            MatchKey::Id => parse_id(&row.text(id_col), &mut errors),
            MatchKey::Name => None,
        };
        if let Some(id) = id {
            if !seen_ids.insert(id) {
                errors.add(COL_ID, format!("Id {} appears more than once in the file.", id.0));
            }
        }
        // Names are the match key here, so each may appear once.
        if let (MatchKey::Name, Some(product)) = (key, product.as_ref()) {
            if !seen_names.insert(product.name.clone()) {
                errors.add(
                    COL_NAME,
                    format!("Name {:?} appears more than once in the file.", product.name),
                );
            }
        }

        match product {
            Some(product) if errors.is_empty() => rows.push(ValidatedRow {
                line: row.line,
                id,
                product,
            }),
            _ => failures.push(RowError {
                line: row.line,
                errors,
            }),
        }
    }

    if failures.is_empty() {
        Ok(ValidatedBatch { key, rows })
    } else {
        Err(failures)
    }
}

fn parse_id(raw: &str, errors: &mut FieldErrors) -> Option<ProductId> {
    if raw.is_empty() {
        return None;
    }
    match raw.parse::<i64>() {
        Ok(id) if id > 0 => Some(ProductId(id)),
        _ => {
            errors.add(COL_ID, "Enter a positive whole number or leave blank.");
            None
        }
    }
}
