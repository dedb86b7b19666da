use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{OrderId, ProductId, StaffId};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardCounts {
    pub product_count: i64,
    pub order_count: i64,
    pub staff_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderSummary {
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub product_name: String,
    pub category: String,
    pub order_quantity: i64,
    pub staff_id: StaffId,
    pub staff_username: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaffSummary {
    pub staff_id: StaffId,
    pub username: String,
    pub display_name: String,
    pub email: String,
    pub is_active: bool,
    pub order_count: i64,
}

/// Counts reported back after an import commits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub inserted: usize,
    pub updated: usize,
}

impl ImportSummary {
    pub fn total(&self) -> usize {
        self.inserted + self.updated
    }
}
