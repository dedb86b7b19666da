use axum::response::Html;
use tera::{Context, Tera};
use tracing::error;

use crate::views::PageError;

const PAGES: [(&str, &str); 10] = [
    ("base.html", include_str!("../templates/base.html")),
    ("login.html", include_str!("../templates/login.html")),
    ("dashboard.html", include_str!("../templates/dashboard.html")),
    ("staff.html", include_str!("../templates/staff.html")),
    ("staff_detail.html", include_str!("../templates/staff_detail.html")),
    ("product.html", include_str!("../templates/product.html")),
    ("product_delete.html", include_str!("../templates/product_delete.html")),
    ("product_update.html", include_str!("../templates/product_update.html")),
    ("order.html", include_str!("../templates/order.html")),
    ("error.html", include_str!("../templates/error.html")),
];

pub(crate) struct Templates {
    tera: Tera,
}

impl Templates {
    /// Registers every embedded page; `.html` names keep tera's autoescaping on.
    pub(crate) fn load() -> Result<Self, tera::Error> {
        let mut tera = Tera::default();
        tera.add_raw_templates(PAGES.to_vec())?;
        Ok(Self { tera })
    }

    pub(crate) fn render(&self, name: &str, context: &Context) -> Result<Html<String>, PageError> {
        self.tera.render(name, context).map(Html).map_err(|err| {
            error!(template = name, error = ?err, "template render failed");
            PageError::internal()
        })
    }
}
