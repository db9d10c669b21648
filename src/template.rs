//! Viewer page templating
//!
//! The viewer bundle is built once and pointed at a relay host per
//! deployment by substituting a placeholder token in its HTML.

use std::path::Path;

use axum::body::Bytes;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::error::Result;

/// Token replaced when no other placeholder is configured
pub const DEFAULT_HOST_PLACEHOLDER: &str = "loggerhost";

/// Substitute every occurrence of `placeholder` in `template` with `host`
pub fn render(template: &str, placeholder: &str, host: &str) -> String {
    template.replace(placeholder, host)
}

struct RenderedPage {
    host: String,
    html: Bytes,
}

/// Viewer page template with a render cache keyed by host
pub struct HostTemplate {
    template: String,
    placeholder: String,
    cache: Mutex<Option<RenderedPage>>,
}

impl HostTemplate {
    pub fn new(template: impl Into<String>, placeholder: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            placeholder: placeholder.into(),
            cache: Mutex::new(None),
        }
    }

    /// Read the template from disk once
    pub async fn load(path: &Path, placeholder: &str) -> Result<Self> {
        let template = tokio::fs::read_to_string(path).await?;
        info!(
            path = %path.display(),
            bytes = template.len(),
            "Viewer template loaded"
        );
        Ok(Self::new(template, placeholder))
    }

    /// Rendered page for `host`. Reuses the previous render when the host
    /// matches, otherwise renders and replaces the cached page. The returned
    /// buffer shares storage with the cache.
    pub fn page(&self, host: &str) -> Bytes {
        let mut cache = self.cache.lock();
        if let Some(page) = cache.as_ref().filter(|page| page.host == host) {
            return page.html.clone();
        }

        debug!(host, "Rendering viewer page");
        let html = Bytes::from(render(&self.template, &self.placeholder, host));
        *cache = Some(RenderedPage {
            host: host.to_string(),
            html: html.clone(),
        });
        html
    }

    /// Drop the cached render
    pub fn invalidate(&self) {
        self.cache.lock().take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn text(page: &Bytes) -> &str {
        std::str::from_utf8(page).unwrap()
    }

    const TEMPLATE: &str =
        r#"<script>window.RELAY = "ws://loggerhost/ws/viewer";</script><p>loggerhost</p>"#;

    #[test]
    fn test_render_replaces_every_token() {
        let html = render(TEMPLATE, DEFAULT_HOST_PLACEHOLDER, "log.example.com");
        assert!(html.contains("ws://log.example.com/ws/viewer"));
        assert!(html.contains("<p>log.example.com</p>"));
        assert!(!html.contains(DEFAULT_HOST_PLACEHOLDER));
    }

    #[test]
    fn test_render_empty_host() {
        let html = render(TEMPLATE, DEFAULT_HOST_PLACEHOLDER, "");
        assert!(html.contains(r#""ws:///ws/viewer""#));
        assert!(!html.contains(DEFAULT_HOST_PLACEHOLDER));
    }

    #[test]
    fn test_page_cache_keyed_by_host() {
        let template = HostTemplate::new(TEMPLATE, DEFAULT_HOST_PLACEHOLDER);

        let first = template.page("a.example");
        let again = template.page("a.example");
        assert_eq!(first.as_ptr(), again.as_ptr());

        let other = template.page("b.example");
        assert_ne!(first.as_ptr(), other.as_ptr());
        assert!(text(&other).contains("b.example"));

        template.invalidate();
        let rerendered = template.page("b.example");
        assert_ne!(other.as_ptr(), rerendered.as_ptr());
        assert_eq!(other, rerendered);
    }

    #[test]
    fn test_custom_placeholder() {
        let template = HostTemplate::new("connect to __HOST__", "__HOST__");
        assert_eq!(text(&template.page("10.0.0.2:8080")), "connect to 10.0.0.2:8080");
    }

    #[tokio::test]
    async fn test_load_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(TEMPLATE.as_bytes()).unwrap();

        let template = HostTemplate::load(file.path(), DEFAULT_HOST_PLACEHOLDER)
            .await
            .unwrap();
        assert!(text(&template.page("relay.local")).contains("relay.local"));
    }

    #[tokio::test]
    async fn test_load_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = HostTemplate::load(&dir.path().join("nope.html"), "x").await;
        assert!(result.is_err());
    }
}
