use serde_json::json;

use crate::AppState;

/// Wraps an already rendered page body in the base layout.
pub fn render_full(state: &AppState, title: &str, body_html: String) -> Result<String, String> {
    let ctx = json!({
        "title": title,
        "body": body_html,
        "backend": state.repos.health.backend(),
        "allowlist_enabled": state.allow_list.is_enabled(),
    });

    state
        .hbs
        .render("layouts/base", &ctx)
        .map_err(|e| e.to_string())
}
