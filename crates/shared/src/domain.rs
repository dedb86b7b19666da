use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);
    };
}

id_newtype!(StaffId);
id_newtype!(ProductId);
id_newtype!(OrderId);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub category: String,
    pub quantity: i64,
}

/// Product attributes that passed validation but have no identity yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub category: String,
    pub quantity: i64,
}

impl NewProduct {
    pub fn with_id(self, id: ProductId) -> Product {
        Product {
            id,
            name: self.name,
            category: self.category,
            quantity: self.quantity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
    pub product_id: ProductId,
    pub order_quantity: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaffUser {
    pub id: StaffId,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub is_active: bool,
    pub date_joined: DateTime<Utc>,
}

impl StaffUser {
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name.trim(), self.last_name.trim());
        let full = full.trim();
        if full.is_empty() {
            self.username.clone()
        } else {
            full.to_string()
        }
    }
}
