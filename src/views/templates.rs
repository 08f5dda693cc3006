use handlebars::{Handlebars, TemplateError};
use std::sync::Arc;

pub type Hbs = Arc<Handlebars<'static>>;

pub fn build_handlebars() -> Result<Hbs, TemplateError> {
    let mut hb = Handlebars::new();

    // Layout + pages
    hb.register_template_string("layouts/base", include_str!("../../templates/layouts/base.hbs"))?;

    hb.register_template_string("pages/dashboard", include_str!("../../templates/pages/dashboard.hbs"))?;
    hb.register_template_string("pages/not_found", include_str!("../../templates/pages/not_found.hbs"))?;

    hb.register_partial("navbar", include_str!("../../templates/partials/navbar.hbs"))?;

    Ok(Arc::new(hb))
}
