//! Submitted key/value fields to typed record attributes.
//!
//! The same validators back the HTML forms and the spreadsheet import, so a
//! row that would be rejected by the product form is rejected by an import
//! too.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::{NewOrder, NewProduct, Product, ProductId};

pub const NAME_MAX_CHARS: usize = 100;
pub const CATEGORY_MAX_CHARS: usize = 50;

/// Key used for errors that belong to the whole form rather than one field.
pub const NON_FIELD: &str = "__all__";

const REQUIRED: &str = "This field is required.";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Flattens to `field: message` lines, used for log output and row reports.
    pub fn summary(&self) -> String {
        self.0
            .iter()
            .flat_map(|(field, messages)| {
                messages.iter().map(move |m| format!("{field}: {m}"))
            })
            .collect::<Vec<_>>()
            .join("; ")
    }

    fn into_result<T>(self, value: impl FnOnce() -> T) -> Result<T, FieldErrors> {
        if self.is_empty() {
            Ok(value())
        } else {
            Err(self)
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductInput {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub quantity: String,
}

impl ProductInput {
    pub fn validate(&self) -> Result<NewProduct, FieldErrors> {
        let mut errors = FieldErrors::default();
        let name = required_text(&mut errors, "name", &self.name, NAME_MAX_CHARS);
        let category = required_text(&mut errors, "category", &self.category, CATEGORY_MAX_CHARS);
        let quantity = whole_number(&mut errors, "quantity", &self.quantity, 0);
        errors.into_result(|| NewProduct {
            name: name.unwrap_or_default(),
            category: category.unwrap_or_default(),
            quantity: quantity.unwrap_or_default(),
        })
    }
}

/// Pre-fills the edit form from a stored product.
impl From<&Product> for ProductInput {
    fn from(product: &Product) -> Self {
        Self {
            name: product.name.clone(),
            category: product.category.clone(),
            quantity: product.quantity.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderInput {
    #[serde(default)]
    pub product: String,
    #[serde(default)]
    pub order_quantity: String,
}

impl OrderInput {
    /// Checks shape only; whether the product exists is up to the caller.
    pub fn validate(&self) -> Result<NewOrder, FieldErrors> {
        let mut errors = FieldErrors::default();
        let product = match self.product.trim() {
            "" => {
                errors.add("product", REQUIRED);
                None
            }
            raw => match raw.parse::<i64>() {
                Ok(id) if id > 0 => Some(ProductId(id)),
                _ => {
                    errors.add("product", "Select a valid choice.");
                    None
                }
            },
        };
        let order_quantity = whole_number(&mut errors, "order_quantity", &self.order_quantity, 1);
        errors.into_result(|| NewOrder {
            product_id: product.unwrap_or(ProductId(0)),
            order_quantity: order_quantity.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginInput {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub next: Option<String>,
}

impl LoginInput {
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::default();
        if self.username.trim().is_empty() {
            errors.add("username", REQUIRED);
        }
        if self.password.is_empty() {
            errors.add("password", REQUIRED);
        }
        errors.into_result(|| ())
    }
}

fn required_text(
    errors: &mut FieldErrors,
    field: &str,
    raw: &str,
    max_chars: usize,
) -> Option<String> {
    let value = raw.trim();
    if value.is_empty() {
        errors.add(field, REQUIRED);
        return None;
    }
    let chars = value.chars().count();
    if chars > max_chars {
        errors.add(
            field,
            format!("Ensure this value has at most {max_chars} characters (it has {chars})."),
        );
        return None;
    }
    Some(value.to_string())
}

fn whole_number(errors: &mut FieldErrors, field: &str, raw: &str, min: i64) -> Option<i64> {
    let value = raw.trim();
    if value.is_empty() {
        errors.add(field, REQUIRED);
        return None;
    }
    match value.parse::<i64>() {
        Ok(n) if n >= min => Some(n),
        Ok(_) => {
            errors.add(
                field,
                format!("Ensure this value is greater than or equal to {min}."),
            );
            None
        }
        Err(_) => {
            errors.add(field, "Enter a whole number.");
            None
        }
    }
}

#[cfg(test)]
#[path = "tests/forms_tests.rs"]
mod tests;
