//! Cookie-held staff sessions.
//!
//! A session is an HS256 JWT naming the staff id. [`authenticate`] only
//! checks the token; [`require_staff`] additionally confirms the account is
//! still active before the request reaches a handler.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use shared::domain::{StaffId, StaffUser};
use tracing::{debug, info};

use crate::{app_state::AppState, views::PageError};

pub const SESSION_COOKIE: &str = "inventory_session";
pub const LOGIN_PATH: &str = "/login/";

#[derive(Clone)]
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_seconds: i64,
}

#[derive(Debug, Serialize, Deserialize)]
struct SessionClaims {
    sub: String,
    username: String,
    iat: i64,
    exp: i64,
}

/// The logged-in staff member, placed in request extensions by [`require_staff`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StaffIdentity {
    pub staff_id: StaffId,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthDecision {
    Authenticated(StaffIdentity),
    /// Location of the login page, carrying the originally requested path.
    Redirect(String),
}

impl SessionKeys {
    pub fn new(secret: &str, ttl_seconds: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl_seconds,
        }
    }

    pub fn issue(&self, staff: &StaffUser) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now();
        let claims = SessionClaims {
            sub: staff.id.0.to_string(),
            username: staff.username.clone(),
            iat: now.timestamp(),
            exp: (now + Duration::seconds(self.ttl_seconds)).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
    }

    /// `None` for tampered, expired or foreign tokens.
    pub fn verify(&self, token: &str) -> Option<StaffIdentity> {
        let data = decode::<SessionClaims>(token, &self.decoding, &Validation::new(Algorithm::HS256))
            .map_err(|error| debug!(%error, "session token rejected"))
            .ok()?;
        let staff_id = data.claims.sub.parse::<i64>().ok()?;
        Some(StaffIdentity {
            staff_id: StaffId(staff_id),
            username: data.claims.username,
        })
    }

    pub fn session_cookie(token: String) -> Cookie<'static> {
        Cookie::build((SESSION_COOKIE, token))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .build()
    }
}

pub fn authenticate(keys: &SessionKeys, jar: &CookieJar, requested: &str) -> AuthDecision {
    match jar
        .get(SESSION_COOKIE)
        .and_then(|cookie| keys.verify(cookie.value()))
    {
        Some(identity) => AuthDecision::Authenticated(identity),
        None => AuthDecision::Redirect(login_location(requested)),
    }
}

pub fn login_location(next: &str) -> String {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("next", next)
        .finish();
    format!("{LOGIN_PATH}?{query}")
}

/// Only same-site absolute paths are followed after login.
pub fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(path) if path.starts_with('/') && !path.starts_with("//") && !path.contains('\\') => {
            path
        }
        _ => "/dashboard/",
    }
}

pub fn clear_session(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(SESSION_COOKIE).path("/"))
}

pub(crate) async fn require_staff(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let requested = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());

    let identity = match authenticate(&state.sessions, &jar, &requested) {
        AuthDecision::Authenticated(identity) => identity,
        AuthDecision::Redirect(location) => return Redirect::to(&location).into_response(),
    };

    match server_api::active_staff(&state.api, identity.staff_id).await {
        Ok(Some(staff)) => {
            request.extensions_mut().insert(StaffIdentity {
                staff_id: staff.id,
                username: staff.username,
            });
            next.run(request).await
        }
        Ok(None) => {
            info!(staff_id = identity.staff_id.0, "session for missing or inactive staff dropped");
            (clear_session(jar), Redirect::to(&login_location(&requested))).into_response()
        }
        Err(err) => PageError::from(err).into_response(),
    }
}

#[cfg(test)]
#[path = "tests/auth_tests.rs"]
mod tests;
