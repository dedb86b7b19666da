use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use shared::{
    domain::{NewOrder, NewProduct, OrderId, Product, ProductId, StaffId, StaffUser},
    protocol::{DashboardCounts, ImportSummary, OrderSummary, StaffSummary},
};
use transfer::{MatchKey, ProductStore, ValidatedBatch};

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

/// A staff row together with its password hash, for login checks only.
#[derive(Debug, Clone)]
pub struct StoredCredentials {
    pub staff: StaffUser,
    pub password_hash: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewStaff {
    pub username: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

const STAFF_COLUMNS: &str =
    "id, username, first_name, last_name, email, is_active, date_joined";

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    pub async fn dashboard_counts(&self) -> Result<DashboardCounts> {
        let row = sqlx::query(
            "SELECT
                (SELECT COUNT(*) FROM products),
                (SELECT COUNT(*) FROM orders),
                (SELECT COUNT(*) FROM staff_users)",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(DashboardCounts {
            product_count: row.get::<i64, _>(0),
            order_count: row.get::<i64, _>(1),
            staff_count: row.get::<i64, _>(2),
        })
    }

    pub async fn create_staff(&self, staff: &NewStaff) -> Result<StaffId> {
        let rec = sqlx::query(
            "INSERT INTO staff_users (username, password_hash, first_name, last_name, email)
             VALUES (?, ?, ?, ?, ?)
             RETURNING id",
        )
        .bind(&staff.username)
        .bind(&staff.password_hash)
        .bind(&staff.first_name)
        .bind(&staff.last_name)
        .bind(&staff.email)
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("failed to create staff user '{}'", staff.username))?;
        Ok(StaffId(rec.get::<i64, _>(0)))
    }

    pub async fn set_staff_active(&self, staff_id: StaffId, active: bool) -> Result<bool> {
        let updated = sqlx::query("UPDATE staff_users SET is_active = ? WHERE id = ?")
            .bind(active)
            .bind(staff_id.0)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(updated > 0)
    }

    pub async fn get_staff(&self, staff_id: StaffId) -> Result<Option<StaffUser>> {
        let row = sqlx::query(&format!(
            "SELECT {STAFF_COLUMNS} FROM staff_users WHERE id = ?"
        ))
        .bind(staff_id.0)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(staff_from_row))
    }

    pub async fn credentials_for_username(&self, username: &str) -> Result<Option<StoredCredentials>> {
        let row = sqlx::query(&format!(
            "SELECT {STAFF_COLUMNS}, password_hash FROM staff_users WHERE username = ?"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| StoredCredentials {
            staff: staff_from_row(&r),
            password_hash: r.get::<String, _>(7),
        }))
    }

    pub async fn list_staff(&self) -> Result<Vec<StaffSummary>> {
        let rows = sqlx::query(
            "SELECT s.id, s.username, s.first_name, s.last_name, s.email, s.is_active,
                    (SELECT COUNT(*) FROM orders o WHERE o.staff_id = s.id)
             FROM staff_users s
             ORDER BY lower(s.username) ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| {
                let username = r.get::<String, _>(1);
                let full_name = format!("{} {}", r.get::<String, _>(2), r.get::<String, _>(3));
                let full_name = full_name.trim();
                StaffSummary {
                    staff_id: StaffId(r.get::<i64, _>(0)),
                    display_name: if full_name.is_empty() {
                        username.clone()
                    } else {
                        full_name.to_string()
                    },
                    username,
                    email: r.get::<String, _>(4),
                    is_active: r.get::<bool, _>(5),
                    order_count: r.get::<i64, _>(6),
                }
            })
            .collect())
    }

    pub async fn create_product(&self, product: &NewProduct) -> Result<ProductId> {
        let rec = sqlx::query(
            "INSERT INTO products (name, category, quantity) VALUES (?, ?, ?) RETURNING id",
        )
        .bind(&product.name)
        .bind(&product.category)
        .bind(product.quantity)
        .fetch_one(&self.pool)
        .await?;
        Ok(ProductId(rec.get::<i64, _>(0)))
    }

    pub async fn get_product(&self, product_id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query("SELECT id, name, category, quantity FROM products WHERE id = ?")
            .bind(product_id.0)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(product_from_row))
    }

    pub async fn list_products_in(&self, category: Option<&str>) -> Result<Vec<Product>> {
        let rows = if let Some(category) = category {
            sqlx::query(
                "SELECT id, name, category, quantity
                 FROM products
                 WHERE category = ?
                 ORDER BY id ASC",
            )
            .bind(category)
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query("SELECT id, name, category, quantity FROM products ORDER BY id ASC")
                .fetch_all(&self.pool)
                .await?
        };
        Ok(rows.iter().map(product_from_row).collect())
    }

    pub async fn list_categories(&self) -> Result<Vec<String>> {
        let categories =
            sqlx::query_scalar::<_, String>("SELECT DISTINCT category FROM products ORDER BY category")
                .fetch_all(&self.pool)
                .await?;
        Ok(categories)
    }

    pub async fn update_product(&self, product_id: ProductId, product: &NewProduct) -> Result<bool> {
        let updated = sqlx::query(
            "UPDATE products SET name = ?, category = ?, quantity = ? WHERE id = ?",
        )
        .bind(&product.name)
        .bind(&product.category)
        .bind(product.quantity)
        .bind(product_id.0)
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(updated > 0)
    }

    /// Orders for the product go with it.
    pub async fn delete_product(&self, product_id: ProductId) -> Result<bool> {
        let deleted = sqlx::query("DELETE FROM products WHERE id = ?")
            .bind(product_id.0)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(deleted > 0)
    }

    pub async fn create_order(&self, staff_id: StaffId, order: &NewOrder) -> Result<OrderId> {
        let rec = sqlx::query(
            "INSERT INTO orders (product_id, staff_id, order_quantity) VALUES (?, ?, ?) RETURNING id",
        )
        .bind(order.product_id.0)
        .bind(staff_id.0)
        .bind(order.order_quantity)
        .fetch_one(&self.pool)
        .await?;
        Ok(OrderId(rec.get::<i64, _>(0)))
    }

    /// Newest first, optionally only one staff member's. `limit` of `None`
    /// returns every matching order.
    pub async fn list_orders(
        &self,
        staff_id: Option<StaffId>,
        limit: Option<u32>,
    ) -> Result<Vec<OrderSummary>> {
        let rows = sqlx::query(
            "SELECT o.id, o.product_id, p.name, p.category, o.order_quantity, o.staff_id, s.username, o.created_at
             FROM orders o
             INNER JOIN products p ON p.id = o.product_id
             INNER JOIN staff_users s ON s.id = o.staff_id
             WHERE ?1 IS NULL OR o.staff_id = ?1
             ORDER BY o.id DESC
             LIMIT ?2",
        )
        .bind(staff_id.map(|id| id.0))
        .bind(limit.map(i64::from).unwrap_or(-1))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| OrderSummary {
                order_id: OrderId(r.get::<i64, _>(0)),
                product_id: ProductId(r.get::<i64, _>(1)),
                product_name: r.get::<String, _>(2),
                category: r.get::<String, _>(3),
                order_quantity: r.get::<i64, _>(4),
                staff_id: StaffId(r.get::<i64, _>(5)),
                staff_username: r.get::<String, _>(6),
                created_at: r.get::<DateTime<Utc>, _>(7),
            })
            .collect())
    }
}

fn staff_from_row(r: &SqliteRow) -> StaffUser {
    StaffUser {
        id: StaffId(r.get::<i64, _>(0)),
        username: r.get::<String, _>(1),
        first_name: r.get::<String, _>(2),
        last_name: r.get::<String, _>(3),
        email: r.get::<String, _>(4),
        is_active: r.get::<bool, _>(5),
        date_joined: r.get::<DateTime<Utc>, _>(6),
    }
}

fn product_from_row(r: &SqliteRow) -> Product {
    Product {
        id: ProductId(r.get::<i64, _>(0)),
        name: r.get::<String, _>(1),
        category: r.get::<String, _>(2),
        quantity: r.get::<i64, _>(3),
    }
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[async_trait]
impl ProductStore for Storage {
    async fn list_products(&self) -> Result<Vec<Product>> {
        self.list_products_in(None).await
    }

    async fn apply_product_batch(&self, batch: &ValidatedBatch) -> Result<ImportSummary> {
        let mut tx = self.pool.begin().await?;
        let mut summary = ImportSummary::default();

        for row in batch.rows_in_apply_order() {
            let existing = match (batch.key(), row.id) {
                (MatchKey::Id, Some(id)) => {
                    sqlx::query_scalar::<_, i64>("SELECT id FROM products WHERE id = ?")
                        .bind(id.0)
                        .fetch_optional(&mut *tx)
                        .await?
                }
                (MatchKey::Id, None) => None,
                (MatchKey::Name, _) => {
                    sqlx::query_scalar::<_, i64>(
                        "SELECT id FROM products WHERE name = ? ORDER BY id ASC LIMIT 1",
                    )
                    .bind(&row.product.name)
                    .fetch_optional(&mut *tx)
                    .await?
                }
            };

            if let Some(id) = existing {
                sqlx::query("UPDATE products SET name = ?, category = ?, quantity = ? WHERE id = ?")
                    .bind(&row.product.name)
                    .bind(&row.product.category)
                    .bind(row.product.quantity)
                    .bind(id)
                    .execute(&mut *tx)
                    .await
                    .with_context(|| format!("failed to update product from row {}", row.line))?;
                summary.updated += 1;
            } else {
                // A NULL id lets SQLite assign the next one.
                sqlx::query("INSERT INTO products (id, name, category, quantity) VALUES (?, ?, ?, ?)")
                    .bind(row.id.map(|id| id.0))
                    .bind(&row.product.name)
                    .bind(&row.product.category)
                    .bind(row.product.quantity)
                    .execute(&mut *tx)
                    .await
                    .with_context(|| format!("failed to insert product from row {}", row.line))?;
                summary.inserted += 1;
            }
        }

        tx.commit().await?;
        Ok(summary)
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
