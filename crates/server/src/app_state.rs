use serde::Serialize;
use server_api::ApiContext;
use tera::Context;
use transfer::COLUMNS;

use crate::{
    auth::{SessionKeys, StaffIdentity},
    config::Settings,
    templates::Templates,
};

/// Presentation settings shared by every page.
#[derive(Debug, Clone, Serialize)]
pub struct SiteConfig {
    pub site_header: String,
    /// Product attributes shown in the listing, in order.
    pub product_columns: Vec<String>,
    pub category_filter: bool,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            site_header: "Inventory Admin".into(),
            product_columns: COLUMNS.iter().map(|c| c.to_string()).collect(),
            category_filter: true,
        }
    }
}

impl SiteConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            site_header: settings.site_header.clone(),
            ..Self::default()
        }
    }
}

pub(crate) struct AppState {
    pub(crate) api: ApiContext,
    pub(crate) templates: Templates,
    pub(crate) sessions: SessionKeys,
    pub(crate) site: SiteConfig,
    pub(crate) max_upload_bytes: usize,
}

impl AppState {
    /// Base render context: site settings and the current user, if any.
    pub(crate) fn context(&self, user: Option<&StaffIdentity>) -> Context {
        let mut context = Context::new();
        context.insert("site", &self.site);
        context.insert("user", &user);
        context
    }
}
