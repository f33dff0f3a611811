//! Render script templating
//!
//! The render script is a small PhantomJS program: it opens the URL with the
//! requested viewport (and optional clip rectangle), waits, and renders to the
//! path given as its first command-line argument. The destination is never
//! baked into the script, so one script serves every filename with the same
//! parameters.

use crate::config::RenderParams;
use crate::error::{Result, ScreenshotError};
use std::collections::HashMap;
use std::path::Path;
use tera::{Context, Tera, Value};
use tracing::debug;

const TEMPLATE_NAME: &str = "screenshot.js";
const BUILTIN_TEMPLATE: &str = include_str!("templates/screenshot.js.tera");

/// Expands the render script template for a set of [`RenderParams`]
///
/// Variables available to templates: `url`, `width`, `height`, `wait`
/// (milliseconds) and `clip` (`null`, or an object with `width` and `height`).
pub struct TemplateRenderer {
    tera: Tera,
}

impl TemplateRenderer {
    pub fn builtin() -> Result<Self> {
        Self::from_source(BUILTIN_TEMPLATE)
    }

    pub fn from_source(source: &str) -> Result<Self> {
        let mut tera = Tera::default();
        tera.autoescape_on(vec![]);
        tera.register_filter("js_string", js_string);
        tera.add_raw_template(TEMPLATE_NAME, source)?;
        Ok(Self { tera })
    }

    pub async fn from_file(path: &Path) -> Result<Self> {
        let source = tokio::fs::read_to_string(path).await.map_err(|e| {
            ScreenshotError::Template(format!(
                "Cannot read template {}: {e}",
                path.display()
            ))
        })?;
        debug!("Loaded render template from {}", path.display());
        Self::from_source(&source)
    }

    /// The configured template file, or the built-in script.
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path).await,
            None => Self::builtin(),
        }
    }

    pub fn render(&self, params: &RenderParams) -> Result<String> {
        let mut context = Context::new();
        context.insert("url", &params.url);
        context.insert("width", &params.width);
        context.insert("height", &params.height);
        context.insert("clip", &params.clip);
        context.insert("wait", &params.wait_ms);

        Ok(self.tera.render(TEMPLATE_NAME, &context)?)
    }
}

/// Encodes a value as a JavaScript string literal.
///
/// JSON leaves U+2028 and U+2029 unescaped, but ES5 engines treat them as
/// line terminators inside string literals.
fn js_string(value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
    let text = value
        .as_str()
        .ok_or_else(|| tera::Error::msg("js_string filter requires a string"))?;
    let encoded = serde_json::to_string(text)
        .map_err(|e| tera::Error::msg(format!("js_string filter error: {e}")))?
        .replace('\u{2028}', "\\u2028")
        .replace('\u{2029}', "\\u2029");
    Ok(Value::String(encoded))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClipRect;

    fn params() -> RenderParams {
        RenderParams {
            url: "https://example.com/?q=a'b".to_string(),
            filename: "shot.png".to_string(),
            width: 800,
            height: 600,
            clip: None,
            wait_ms: 250,
        }
    }

    #[test]
    fn test_render_viewport_without_clip() {
        let renderer = TemplateRenderer::builtin().unwrap();
        let script = renderer.render(&params()).unwrap();

        assert!(script.contains("width: 800"));
        assert!(script.contains("height: 600"));
        assert!(!script.contains("clipRect"));
        assert!(script.contains("}, 250);"));
        assert!(!script.contains("shot.png"));
    }

    #[test]
    fn test_render_clip_block() {
        let renderer = TemplateRenderer::builtin().unwrap();
        let mut params = params();
        params.clip = Some(ClipRect { width: 100, height: 50 });

        let script = renderer.render(&params).unwrap();
        assert!(script.contains("page.clipRect"));
        assert!(script.contains("width: 100"));
        assert!(script.contains("height: 50"));
    }

    #[test]
    fn test_url_is_emitted_as_string_literal() {
        let renderer = TemplateRenderer::builtin().unwrap();
        let script = renderer.render(&params()).unwrap();
        assert!(script.contains(r#"page.open("https://example.com/?q=a'b", function"#));
    }

    #[test]
    fn test_url_line_separators_are_escaped() {
        let renderer = TemplateRenderer::builtin().unwrap();
        let mut params = params();
        params.url = "https://example.com/a\u{2028}b\u{2029}c".to_string();

        let script = renderer.render(&params).unwrap();
        assert!(!script.contains('\u{2028}'));
        assert!(!script.contains('\u{2029}'));
        assert!(script.contains(r#"page.open("https://example.com/a\u2028b\u2029c", function"#));
    }

    #[test]
    fn test_invalid_template_source() {
        let err = TemplateRenderer::from_source("{% if %}").err().unwrap();
        assert!(matches!(err, ScreenshotError::Template(_)));
    }

    #[test]
    fn test_undefined_variable_fails_render() {
        let renderer = TemplateRenderer::from_source("{{ missing }}").unwrap();
        let err = renderer.render(&params()).unwrap_err();
        assert!(matches!(err, ScreenshotError::Template(_)));
    }

    #[tokio::test]
    async fn test_missing_template_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = TemplateRenderer::from_file(&dir.path().join("nope.tera"))
            .await
            .err()
            .unwrap();
        match err {
            ScreenshotError::Template(message) => assert!(message.contains("nope.tera")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_custom_template_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.tera");
        tokio::fs::write(&path, "{{ width }}x{{ height }}@{{ url }}").await.unwrap();

        let renderer = TemplateRenderer::load(Some(path.as_path())).await.unwrap();
        assert_eq!(
            renderer.render(&params()).unwrap(),
            "800x600@https://example.com/?q=a'b"
        );
    }
}
