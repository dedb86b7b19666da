use serde::Serialize;
use shared::{
    domain::{OrderId, Product, ProductId, StaffId, StaffUser},
    error::{ApiError, ErrorCode},
    forms::{FieldErrors, LoginInput, OrderInput, ProductInput, NON_FIELD},
    protocol::{DashboardCounts, ImportSummary, OrderSummary, StaffSummary},
};
use storage::{NewStaff, Storage};
use tracing::{error, info, warn};
use transfer::{MatchKey, TransferError};

pub mod passwords;

pub use passwords::{hash_password, verify_password, PasswordError};

pub const USERNAME_MAX_CHARS: usize = 150;
pub const PASSWORD_MIN_CHARS: usize = 8;

const BAD_CREDENTIALS: &str =
    "Please enter a correct username and password. Note that both fields may be case-sensitive.";

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
    pub import_key: MatchKey,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductListing {
    pub products: Vec<Product>,
    pub categories: Vec<String>,
    pub selected_category: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StaffDetail {
    pub staff: StaffUser,
    pub display_name: String,
    pub orders: Vec<OrderSummary>,
}

/// Plain-text account details; only the hash is persisted.
#[derive(Debug, Clone, Default)]
pub struct StaffAccount {
    pub username: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

pub async fn health(ctx: &ApiContext) -> Result<(), ApiError> {
    ctx.storage.health_check().await.map_err(internal)
}

pub async fn dashboard_counts(ctx: &ApiContext) -> Result<DashboardCounts, ApiError> {
    ctx.storage.dashboard_counts().await.map_err(internal)
}

pub async fn list_products(
    ctx: &ApiContext,
    category: Option<&str>,
) -> Result<ProductListing, ApiError> {
    let category = category.map(str::trim).filter(|c| !c.is_empty());
    let products = ctx
        .storage
        .list_products_in(category)
        .await
        .map_err(internal)?;
    let categories = ctx.storage.list_categories().await.map_err(internal)?;
    Ok(ProductListing {
        products,
        categories,
        selected_category: category.map(str::to_string),
    })
}

pub async fn create_product(ctx: &ApiContext, input: &ProductInput) -> Result<Product, ApiError> {
    let product = input.validate().map_err(ApiError::invalid_fields)?;
    let product_id = ctx
        .storage
        .create_product(&product)
        .await
        .map_err(internal)?;
    info!(product_id = product_id.0, name = %product.name, "product created");
    Ok(product.with_id(product_id))
}

pub async fn get_product(ctx: &ApiContext, product_id: ProductId) -> Result<Product, ApiError> {
    ctx.storage
        .get_product(product_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::not_found("product"))
}

pub async fn update_product(
    ctx: &ApiContext,
    product_id: ProductId,
    input: &ProductInput,
) -> Result<Product, ApiError> {
    get_product(ctx, product_id).await?;
    let product = input.validate().map_err(ApiError::invalid_fields)?;
    let updated = ctx
        .storage
        .update_product(product_id, &product)
        .await
        .map_err(internal)?;
    if !updated {
        // Deleted between the lookup and the write.
        return Err(ApiError::not_found("product"));
    }
    info!(product_id = product_id.0, "product updated");
    Ok(product.with_id(product_id))
}

pub async fn delete_product(ctx: &ApiContext, product_id: ProductId) -> Result<(), ApiError> {
    let deleted = ctx
        .storage
        .delete_product(product_id)
        .await
        .map_err(internal)?;
    if !deleted {
        return Err(ApiError::not_found("product"));
    }
    info!(product_id = product_id.0, "product deleted");
    Ok(())
}

/// The order is attributed to `staff_id`, never to anything the form says.
pub async fn create_order(
    ctx: &ApiContext,
    staff_id: StaffId,
    input: &OrderInput,
) -> Result<OrderId, ApiError> {
    let order = input.validate().map_err(ApiError::invalid_fields)?;
    let product_exists = ctx
        .storage
        .get_product(order.product_id)
        .await
        .map_err(internal)?
        .is_some();
    if !product_exists {
        let mut fields = FieldErrors::default();
        fields.add(
            "product",
            "Select a valid choice. That choice is not one of the available choices.",
        );
        return Err(ApiError::invalid_fields(fields));
    }

    let order_id = ctx
        .storage
        .create_order(staff_id, &order)
        .await
        .map_err(internal)?;
    info!(
        order_id = order_id.0,
        product_id = order.product_id.0,
        staff_id = staff_id.0,
        "order created"
    );
    Ok(order_id)
}

pub async fn list_orders(
    ctx: &ApiContext,
    limit: Option<u32>,
) -> Result<Vec<OrderSummary>, ApiError> {
    ctx.storage.list_orders(None, limit).await.map_err(internal)
}

pub async fn list_staff(ctx: &ApiContext) -> Result<Vec<StaffSummary>, ApiError> {
    ctx.storage.list_staff().await.map_err(internal)
}

pub async fn staff_detail(ctx: &ApiContext, staff_id: StaffId) -> Result<StaffDetail, ApiError> {
    let staff = ctx
        .storage
        .get_staff(staff_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::not_found("staff member"))?;
    let orders = ctx
        .storage
        .list_orders(Some(staff_id), None)
        .await
        .map_err(internal)?;
    Ok(StaffDetail {
        display_name: staff.display_name(),
        staff,
        orders,
    })
}

/// Nothing is written unless every row validates.
pub async fn import_products(ctx: &ApiContext, bytes: &[u8]) -> Result<ImportSummary, ApiError> {
    match transfer::import_products(&ctx.storage, bytes, ctx.import_key).await {
        Ok(summary) => Ok(summary),
        Err(TransferError::Malformed(reason)) => {
            warn!(%reason, "rejected unreadable import file");
            Err(ApiError::new(
                ErrorCode::Validation,
                "Import failed: the file is not a readable .xlsx spreadsheet.",
            ))
        }
        Err(TransferError::InvalidRows(rows)) => Err(ApiError::new(
            ErrorCode::Validation,
            format!("Import failed: {} row(s) had errors.", rows.len()),
        )),
        Err(other) => Err(internal(other)),
    }
}

pub async fn export_products(ctx: &ApiContext) -> Result<Vec<u8>, ApiError> {
    transfer::export_products(&ctx.storage)
        .await
        .map_err(internal)
}

/// Checks a login form. Unknown users, wrong passwords and inactive accounts
/// all get the same `Unauthorized` answer.
pub async fn authenticate(ctx: &ApiContext, input: &LoginInput) -> Result<StaffUser, ApiError> {
    input.validate().map_err(ApiError::invalid_fields)?;

    let username = input.username.trim();
    let Some(credentials) = ctx
        .storage
        .credentials_for_username(username)
        .await
        .map_err(internal)?
    else {
        warn!(%username, "login rejected: unknown user");
        return Err(bad_credentials());
    };

    let matches = verify_password(&input.password, &credentials.password_hash).map_err(|e| {
        error!(%username, error = %e, "stored password hash is unusable");
        bad_credentials()
    })?;
    if !matches || !credentials.staff.is_active {
        warn!(%username, active = credentials.staff.is_active, "login rejected");
        return Err(bad_credentials());
    }

    info!(staff_id = credentials.staff.id.0, %username, "staff logged in");
    Ok(credentials.staff)
}

/// Resolves a session subject; inactive or deleted accounts come back as `None`.
pub async fn active_staff(
    ctx: &ApiContext,
    staff_id: StaffId,
) -> Result<Option<StaffUser>, ApiError> {
    let staff = ctx.storage.get_staff(staff_id).await.map_err(internal)?;
    Ok(staff.filter(|s| s.is_active))
}

pub async fn create_staff(ctx: &ApiContext, account: &StaffAccount) -> Result<StaffId, ApiError> {
    let mut fields = FieldErrors::default();
    let username = account.username.trim();
    if username.is_empty() {
        fields.add("username", "This field is required.");
    } else if username.chars().count() > USERNAME_MAX_CHARS {
        fields.add(
            "username",
            format!("Ensure this value has at most {USERNAME_MAX_CHARS} characters."),
        );
    }
    if account.password.chars().count() < PASSWORD_MIN_CHARS {
        fields.add(
            "password",
            format!("This password is too short. It must contain at least {PASSWORD_MIN_CHARS} characters."),
        );
    }
    if !fields.is_empty() {
        return Err(ApiError::invalid_fields(fields));
    }

    let taken = ctx
        .storage
        .credentials_for_username(username)
        .await
        .map_err(internal)?
        .is_some();
    if taken {
        let mut fields = FieldErrors::default();
        fields.add("username", "A user with that username already exists.");
        return Err(ApiError::invalid_fields(fields));
    }

    let password_hash = hash_password(&account.password).map_err(internal)?;
    let staff_id = ctx
        .storage
        .create_staff(&NewStaff {
            username: username.to_string(),
            password_hash,
            first_name: account.first_name.trim().to_string(),
            last_name: account.last_name.trim().to_string(),
            email: account.email.trim().to_string(),
        })
        .await
        .map_err(internal)?;
    info!(staff_id = staff_id.0, %username, "staff account created");
    Ok(staff_id)
}

pub async fn set_staff_active(
    ctx: &ApiContext,
    staff_id: StaffId,
    active: bool,
) -> Result<(), ApiError> {
    let updated = ctx
        .storage
        .set_staff_active(staff_id, active)
        .await
        .map_err(internal)?;
    if !updated {
        return Err(ApiError::not_found("staff member"));
    }
    info!(staff_id = staff_id.0, active, "staff account status changed");
    Ok(())
}

fn bad_credentials() -> ApiError {
    let mut fields = FieldErrors::default();
    fields.add(NON_FIELD, BAD_CREDENTIALS);
    ApiError {
        code: ErrorCode::Unauthorized,
        message: BAD_CREDENTIALS.to_string(),
        fields,
    }
}

pub fn internal(err: impl std::fmt::Display) -> ApiError {
    ApiError::new(ErrorCode::Internal, err.to_string())
}
