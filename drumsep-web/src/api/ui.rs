//! Status page: output folder, pending flash messages, upload form

use axum::{
    extract::State,
    response::{Html, IntoResponse},
    routing::get,
    Router,
};

use crate::api::flash::FlashMessage;
use crate::api::upload::UPLOAD_FIELD;
use crate::AppState;

/// Escape text for inclusion in HTML element content or attribute values
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

fn render_messages(messages: &[FlashMessage]) -> String {
    messages
        .iter()
        .map(|m| {
            format!(
                "<pre class=\"{}\">{}</pre>",
                m.category.css_class(),
                escape_html(&m.text)
            )
        })
        .collect::<Vec<_>>()
        .join("\n        ")
}

/// GET /
pub async fn root_page(State(state): State<AppState>) -> impl IntoResponse {
    let messages = state.flash.drain().await;
    let config = state.coordinator.config();

    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <title>Stem Remover</title>
    <style>
        body {{ font-family: system-ui, -apple-system, 'Segoe UI', Roboto, Helvetica, Arial, sans-serif; margin: 40px; }}
        .box {{ max-width: 820px; margin: auto; }}
        .card {{ border: 1px solid #ddd; border-radius: 12px; padding: 20px; }}
        .muted {{ color: #666; }}
        button {{ padding: 10px 16px; border-radius: 8px; border: 1px solid #333; background: #111; color: #fff; cursor: pointer; }}
        input[type=file] {{ padding: 10px; border: 1px dashed #888; border-radius: 8px; width: 100%; }}
        pre {{ white-space: pre-wrap; font-family: inherit; }}
        .ok {{ color: green; }}
        .err {{ color: #b00020; }}
        footer {{ margin-top: 20px; font-size: 12px; color: #888; font-family: 'Courier New', monospace; }}
    </style>
</head>
<body>
<div class="box">
    <h2>Remove {component} ({model})</h2>
    <p class="muted">Output folder: <b>{output_dir}</b></p>
    <div id="messages">
        {messages}
    </div>
    <div class="card">
        <form method="post" action="/upload" enctype="multipart/form-data">
            <input type="file" name="{field}" multiple required>
            <button type="submit">Separate</button>
        </form>
        <p class="muted">Accepted: {accepted}</p>
    </div>
    <footer>{name} v{version} ({git_hash}, {profile})</footer>
</div>
</body>
</html>"#,
        component = escape_html(&config.component),
        model = escape_html(&config.model),
        output_dir = escape_html(&config.output_dir.display().to_string()),
        messages = render_messages(&messages),
        field = UPLOAD_FIELD,
        accepted = config
            .allowed_extensions
            .iter()
            .map(|e| format!(".{}", e))
            .collect::<Vec<_>>()
            .join(" "),
        name = env!("CARGO_PKG_NAME"),
        version = env!("CARGO_PKG_VERSION"),
        git_hash = env!("GIT_HASH"),
        profile = env!("BUILD_PROFILE"),
    ))
}

/// Build UI routes
pub fn ui_routes() -> Router<AppState> {
    Router::new().route("/", get(root_page))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::flash::FlashCategory;

    #[test]
    fn escapes_markup() {
        assert_eq!(
            escape_html("<b>\"a\" & 'b'</b>"),
            "&lt;b&gt;&quot;a&quot; &amp; &#39;b&#39;&lt;/b&gt;"
        );
    }

    #[test]
    fn renders_messages_with_category_class() {
        let html = render_messages(&[
            FlashMessage {
                category: FlashCategory::Ok,
                text: "1 file(s) processed".to_string(),
            },
            FlashMessage {
                category: FlashCategory::Err,
                text: "x.mkv: error: <crash>".to_string(),
            },
        ]);
        assert!(html.contains("<pre class=\"ok\">1 file(s) processed</pre>"));
        assert!(html.contains("<pre class=\"err\">x.mkv: error: &lt;crash&gt;</pre>"));
    }
}
