use serde_json::json;
use std::path::Path;
use tracing::{info, warn};

/// Placeholder replaced with the rendered app markup
const MARKUP_SLOT: &str = "{{thing}}";
/// Placeholder replaced with the serialized shared props
const PROPS_SLOT: &str = "{{props}}";

/// Shell served when no template ships with the deployment. The client
/// bundle renders into `#app` and hydrates from `window.__PROPS__`.
const DEFAULT_TEMPLATE: &str = r#"<!doctype html>
<html>
<head>
<meta charset="utf-8">
<title>Todos</title>
<link rel="stylesheet" href="/css/main.css">
</head>
<body>
<div id="app">{{thing}}</div>
<script>window.__PROPS__ = {{props}}</script>
<script src="/index.client.bundle.js"></script>
</body>
</html>
"#;

/// HTML page shell served for all non-API GETs.
///
/// The template carries two placeholders: `{{thing}}` for the app markup
/// and `{{props}}` for the serialized shared props. Rendering the React
/// tree itself is the client bundle's job; the server only substitutes
/// the placeholders.
#[derive(Debug, Clone)]
pub struct PageShell {
    template: String,
}

impl PageShell {
    /// Load `index.html` from the static root, falling back to the
    /// built-in shell when the file is absent
    pub fn load(static_dir: &Path) -> Self {
        let template_path = static_dir.join("index.html");

        match std::fs::read_to_string(&template_path) {
            Ok(template) => {
                info!(path = %template_path.display(), "Loaded page template");
                Self { template }
            }
            Err(e) => {
                warn!(
                    path = %template_path.display(),
                    error = %e,
                    "Page template not found, using built-in shell"
                );
                Self {
                    template: DEFAULT_TEMPLATE.to_string(),
                }
            }
        }
    }

    /// Build a shell from an explicit template string
    pub fn from_template(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// Render the shell for a request path
    pub fn render(&self, path: &str) -> String {
        let props = json!({ "path": path });

        self.template
            .replace(MARKUP_SLOT, "")
            .replace(PROPS_SLOT, &props.to_string())
    }
}
