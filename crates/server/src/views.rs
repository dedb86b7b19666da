//! One handler per page. Each reads its input, calls a single operation and
//! either renders a template or redirects (POST, redirect, GET).

use std::sync::Arc;

use axum::{
    extract::{FromRequest, Multipart, Path, Query, Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
    Extension, Form,
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use server_api::ProductListing;
use shared::{
    domain::{ProductId, StaffId},
    error::{ApiError, ErrorCode},
    forms::{FieldErrors, LoginInput, OrderInput, ProductInput},
};
use tera::Context;
use tracing::{error, info, warn};
use transfer::{EXPORT_FILENAME, XLSX_CONTENT_TYPE};

use crate::{
    app_state::AppState,
    auth::{clear_session, safe_next, SessionKeys, StaffIdentity, LOGIN_PATH},
};

const RECENT_ORDERS: u32 = 10;

type AppStateRef = State<Arc<AppState>>;

/// A failed request, rendered as `error.html` by [`render_error_pages`].
#[derive(Debug, Clone)]
pub struct PageError {
    status: StatusCode,
    message: String,
}

impl PageError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn internal() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Something went wrong on our side. The error has been logged.",
        )
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }
}

impl From<ApiError> for PageError {
    fn from(err: ApiError) -> Self {
        match err.code {
            ErrorCode::NotFound => Self::not_found(capitalize(&err.message)),
            ErrorCode::Validation => Self::new(StatusCode::BAD_REQUEST, err.message),
            ErrorCode::Unauthorized => Self::new(StatusCode::UNAUTHORIZED, err.message),
            ErrorCode::Forbidden => Self::new(StatusCode::FORBIDDEN, err.message),
            ErrorCode::Internal => {
                error!(error = %err.message, "request failed");
                Self::internal()
            }
        }
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        let mut response = (self.status, self.message.clone()).into_response();
        response.extensions_mut().insert(self);
        response
    }
}

/// Swaps the plain-text body of a [`PageError`] response (or a body-limit
/// rejection) for the error page.
pub(crate) async fn render_error_pages(
    State(state): AppStateRef,
    request: Request,
    next: Next,
) -> Response {
    let response = next.run(request).await;
    let page = match response.extensions().get::<PageError>().cloned() {
        Some(page) => page,
        // Rejected by the body limit before any handler ran.
        None if response.status() == StatusCode::PAYLOAD_TOO_LARGE => PageError::new(
            StatusCode::PAYLOAD_TOO_LARGE,
            "The upload is larger than this server accepts.",
        ),
        None => return response,
    };

    let mut context = state.context(None);
    context.insert("status", &page.status.as_u16());
    context.insert("reason", &page.status.canonical_reason().unwrap_or("Error"));
    context.insert("message", &page.message);
    match state.templates.render("error.html", &context) {
        Ok(html) => (page.status, html).into_response(),
        Err(_) => response,
    }
}

pub(crate) async fn not_found() -> PageError {
    PageError::not_found("The requested page does not exist.")
}

pub(crate) async fn root() -> Redirect {
    Redirect::to("/dashboard/")
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct NextQuery {
    next: Option<String>,
}

pub(crate) async fn login_form(
    State(state): AppStateRef,
    Query(query): Query<NextQuery>,
) -> Result<Response, PageError> {
    let form = LoginInput {
        next: query.next,
        ..LoginInput::default()
    };
    render_login(&state, &form, &FieldErrors::default())
}

pub(crate) async fn login(
    State(state): AppStateRef,
    jar: CookieJar,
    Form(form): Form<LoginInput>,
) -> Result<Response, PageError> {
    let staff = match server_api::authenticate(&state.api, &form).await {
        Ok(staff) => staff,
        Err(err) if matches!(err.code, ErrorCode::Validation | ErrorCode::Unauthorized) => {
            return render_login(&state, &form, &err.fields);
        }
        Err(err) => return Err(err.into()),
    };

    let token = state.sessions.issue(&staff).map_err(|err| {
        error!(error = %err, "failed to issue session token");
        PageError::internal()
    })?;
    let jar = jar.add(SessionKeys::session_cookie(token));
    Ok((jar, Redirect::to(safe_next(form.next.as_deref()))).into_response())
}

pub(crate) async fn logout(jar: CookieJar) -> impl IntoResponse {
    (clear_session(jar), Redirect::to(LOGIN_PATH))
}

fn render_login(
    state: &AppState,
    form: &LoginInput,
    errors: &FieldErrors,
) -> Result<Response, PageError> {
    let mut context = state.context(None);
    context.insert("form", &LoginForm::from(form));
    context.insert("errors", errors);
    context.insert("next", &form.next);
    Ok(state.templates.render("login.html", &context)?.into_response())
}

/// The login form echoed back without its password.
#[derive(serde::Serialize)]
struct LoginForm<'a> {
    username: &'a str,
}

impl<'a> From<&'a LoginInput> for LoginForm<'a> {
    fn from(input: &'a LoginInput) -> Self {
        Self {
            username: &input.username,
        }
    }
}

pub(crate) async fn dashboard(
    State(state): AppStateRef,
    Extension(identity): Extension<StaffIdentity>,
) -> Result<Response, PageError> {
    render_dashboard(&state, &identity, &OrderInput::default(), &FieldErrors::default()).await
}

pub(crate) async fn create_order(
    State(state): AppStateRef,
    Extension(identity): Extension<StaffIdentity>,
    Form(form): Form<OrderInput>,
) -> Result<Response, PageError> {
    match server_api::create_order(&state.api, identity.staff_id, &form).await {
        Ok(_) => Ok(Redirect::to("/dashboard/").into_response()),
        Err(err) if err.code == ErrorCode::Validation => {
            render_dashboard(&state, &identity, &form, &err.fields).await
        }
        Err(err) => Err(err.into()),
    }
}

async fn render_dashboard(
    state: &AppState,
    identity: &StaffIdentity,
    form: &OrderInput,
    errors: &FieldErrors,
) -> Result<Response, PageError> {
    let counts = server_api::dashboard_counts(&state.api).await?;
    let products = server_api::list_products(&state.api, None).await?.products;
    let orders = server_api::list_orders(&state.api, Some(RECENT_ORDERS)).await?;

    let mut context = state.context(Some(identity));
    context.insert("counts", &counts);
    context.insert("products", &products);
    context.insert("orders", &orders);
    context.insert("form", form);
    context.insert("errors", errors);
    Ok(state.templates.render("dashboard.html", &context)?.into_response())
}

pub(crate) async fn staff(
    State(state): AppStateRef,
    Extension(identity): Extension<StaffIdentity>,
) -> Result<Response, PageError> {
    let staff = server_api::list_staff(&state.api).await?;
    let mut context = state.context(Some(&identity));
    context.insert("staff", &staff);
    Ok(state.templates.render("staff.html", &context)?.into_response())
}

pub(crate) async fn staff_detail(
    State(state): AppStateRef,
    Extension(identity): Extension<StaffIdentity>,
    Path(staff_id): Path<i64>,
) -> Result<Response, PageError> {
    let detail = server_api::staff_detail(&state.api, StaffId(staff_id)).await?;
    let mut context = state.context(Some(&identity));
    context.insert("detail", &detail);
    Ok(state.templates.render("staff_detail.html", &context)?.into_response())
}

pub(crate) async fn orders(
    State(state): AppStateRef,
    Extension(identity): Extension<StaffIdentity>,
) -> Result<Response, PageError> {
    let orders = server_api::list_orders(&state.api, None).await?;
    let mut context = state.context(Some(&identity));
    context.insert("orders", &orders);
    Ok(state.templates.render("order.html", &context)?.into_response())
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ProductQuery {
    category: Option<String>,
    /// `<inserted>,<updated>` after a successful import.
    imported: Option<String>,
}

/// Urlencoded submissions to `/product/`: an export request or a new product.
#[derive(Debug, Default, Deserialize)]
struct ProductSubmission {
    #[serde(default)]
    action: Option<String>,
    #[serde(flatten)]
    input: ProductInput,
}

/// Extra state for re-rendering the product page.
#[derive(Default)]
struct ProductPage<'a> {
    category: Option<&'a str>,
    form: ProductInput,
    errors: FieldErrors,
    import_message: Option<String>,
    import_error: Option<String>,
}

pub(crate) async fn products(
    State(state): AppStateRef,
    Extension(identity): Extension<StaffIdentity>,
    Query(query): Query<ProductQuery>,
) -> Result<Response, PageError> {
    let import_message = query.imported.as_deref().and_then(import_message);
    render_products(
        &state,
        &identity,
        ProductPage {
            category: query.category.as_deref(),
            import_message,
            ..ProductPage::default()
        },
    )
    .await
}

/// `POST /product/`: multipart bodies carry an upload, urlencoded bodies
/// either ask for an export or create a product.
pub(crate) async fn product_action(
    State(state): AppStateRef,
    Extension(identity): Extension<StaffIdentity>,
    request: Request,
) -> Result<Response, PageError> {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("multipart/form-data"));

    if is_multipart {
        let multipart = Multipart::from_request(request, &state)
            .await
            .map_err(|rejection| PageError::new(rejection.status(), rejection.body_text()))?;
        return upload_products(&state, &identity, multipart).await;
    }

    let Form(submission) = Form::<ProductSubmission>::from_request(request, &state)
        .await
        .map_err(|rejection| PageError::new(rejection.status(), rejection.body_text()))?;
    match submission.action.as_deref() {
        Some("export") => export_products(&state, &identity).await,
        _ => create_product(&state, &identity, submission.input).await,
    }
}

async fn create_product(
    state: &AppState,
    identity: &StaffIdentity,
    form: ProductInput,
) -> Result<Response, PageError> {
    match server_api::create_product(&state.api, &form).await {
        Ok(_) => Ok(Redirect::to("/product/").into_response()),
        Err(err) if err.code == ErrorCode::Validation => {
            render_products(
                state,
                identity,
                ProductPage {
                    form,
                    errors: err.fields,
                    ..ProductPage::default()
                },
            )
            .await
        }
        Err(err) => Err(err.into()),
    }
}

async fn upload_products(
    state: &AppState,
    identity: &StaffIdentity,
    mut multipart: Multipart,
) -> Result<Response, PageError> {
    let bad_request = |err: axum::extract::multipart::MultipartError| {
        PageError::new(StatusCode::BAD_REQUEST, err.body_text())
    };

    let mut action = None;
    let mut file = None;
    while let Some(field) = multipart.next_field().await.map_err(bad_request)? {
        match field.name().map(str::to_string).as_deref() {
            Some("action") => action = Some(field.text().await.map_err(bad_request)?),
            Some("file") => file = Some(field.bytes().await.map_err(bad_request)?),
            _ => {}
        }
    }

    if action.as_deref() == Some("export") {
        return export_products(state, identity).await;
    }

    let outcome = match file.filter(|bytes| !bytes.is_empty()) {
        None => Err("Import failed: choose an .xlsx file to upload.".to_string()),
        Some(bytes) => match server_api::import_products(&state.api, &bytes).await {
            Ok(summary) => {
                info!(
                    staff = %identity.username,
                    inserted = summary.inserted,
                    updated = summary.updated,
                    "products imported"
                );
                Ok(summary)
            }
            Err(err) if err.code == ErrorCode::Validation => Err(err.message),
            Err(err) => return Err(err.into()),
        },
    };

    match outcome {
        Ok(summary) => Ok(Redirect::to(&format!(
            "/product/?imported={},{}",
            summary.inserted, summary.updated
        ))
        .into_response()),
        Err(message) => {
            warn!(staff = %identity.username, %message, "product import rejected");
            render_products(
                state,
                identity,
                ProductPage {
                    import_error: Some(message),
                    ..ProductPage::default()
                },
            )
            .await
        }
    }
}

async fn export_products(state: &AppState, identity: &StaffIdentity) -> Result<Response, PageError> {
    let bytes = server_api::export_products(&state.api).await?;
    info!(staff = %identity.username, bytes = bytes.len(), "products exported");
    Ok((
        [
            (header::CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{EXPORT_FILENAME}\""),
            ),
        ],
        bytes,
    )
        .into_response())
}

async fn render_products(
    state: &AppState,
    identity: &StaffIdentity,
    page: ProductPage<'_>,
) -> Result<Response, PageError> {
    let ProductListing {
        products,
        categories,
        selected_category,
    } = server_api::list_products(&state.api, page.category).await?;

    let mut context = state.context(Some(identity));
    context.insert("products", &products);
    context.insert("categories", &categories);
    context.insert("selected_category", &selected_category);
    context.insert("form", &page.form);
    context.insert("errors", &page.errors);
    context.insert("import_message", &page.import_message);
    context.insert("import_error", &page.import_error);
    Ok(state.templates.render("product.html", &context)?.into_response())
}

fn import_message(raw: &str) -> Option<String> {
    let (inserted, updated) = raw.split_once(',')?;
    let inserted = inserted.trim().parse::<usize>().ok()?;
    let updated = updated.trim().parse::<usize>().ok()?;
    Some(format!(
        "Import finished: {} product(s) added, {} updated.",
        inserted, updated
    ))
}

pub(crate) async fn product_delete_confirm(
    State(state): AppStateRef,
    Extension(identity): Extension<StaffIdentity>,
    Path(product_id): Path<i64>,
) -> Result<Response, PageError> {
    let product = server_api::get_product(&state.api, ProductId(product_id)).await?;
    let mut context = state.context(Some(&identity));
    context.insert("product", &product);
    Ok(state.templates.render("product_delete.html", &context)?.into_response())
}

pub(crate) async fn product_delete(
    State(state): AppStateRef,
    Extension(identity): Extension<StaffIdentity>,
    Path(product_id): Path<i64>,
) -> Result<Redirect, PageError> {
    server_api::delete_product(&state.api, ProductId(product_id)).await?;
    info!(staff = %identity.username, product_id, "product removed via dashboard");
    Ok(Redirect::to("/product/"))
}

pub(crate) async fn product_update_form(
    State(state): AppStateRef,
    Extension(identity): Extension<StaffIdentity>,
    Path(product_id): Path<i64>,
) -> Result<Response, PageError> {
    let product = server_api::get_product(&state.api, ProductId(product_id)).await?;
    render_update(
        &state,
        &identity,
        product_id,
        &ProductInput::from(&product),
        &FieldErrors::default(),
    )
}

pub(crate) async fn product_update(
    State(state): AppStateRef,
    Extension(identity): Extension<StaffIdentity>,
    Path(product_id): Path<i64>,
    Form(form): Form<ProductInput>,
) -> Result<Response, PageError> {
    match server_api::update_product(&state.api, ProductId(product_id), &form).await {
        Ok(_) => Ok(Redirect::to("/product/").into_response()),
        Err(err) if err.code == ErrorCode::Validation => {
            render_update(&state, &identity, product_id, &form, &err.fields)
        }
        Err(err) => Err(err.into()),
    }
}

fn render_update(
    state: &AppState,
    identity: &StaffIdentity,
    product_id: i64,
    form: &ProductInput,
    errors: &FieldErrors,
) -> Result<Response, PageError> {
    let mut context: Context = state.context(Some(identity));
    context.insert("product_id", &product_id);
    context.insert("form", form);
    context.insert("errors", errors);
    Ok(state.templates.render("product_update.html", &context)?.into_response())
}

fn capitalize(message: &str) -> String {
    let mut chars = message.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect::<String>() + ".",
        None => String::new(),
    }
}

#[cfg(test)]
#[path = "tests/views_tests.rs"]
mod tests;
