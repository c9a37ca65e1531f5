//! Lazily generated popup and tooltip content
//!
//! Popup HTML is assembled the first time the popup opens, not when the
//! marker is created. All hospital text passes through the security gate
//! and the website link is only rendered for allowed URLs.

use hospital_map_cache::{ImageCache, ImageHandle, DEFAULT_IMAGE};
use hospital_map_core::{ErrorHandler, Hospital, MapError, Translations};
use hospital_map_security::{escape_html, SecurityGate};
use std::fmt::Write as _;
use std::sync::{Arc, OnceLock};

/// Everything a popup needs to render, shared by all popups of a rebuild
#[derive(Clone)]
pub struct PopupContext {
    pub gate: Arc<SecurityGate>,
    pub translations: Arc<Translations>,
    pub language: String,
    pub images: Option<ImageCache>,
    pub errors: ErrorHandler,
}

impl PopupContext {
    pub fn new(gate: Arc<SecurityGate>, errors: ErrorHandler) -> Self {
        Self {
            gate,
            translations: Arc::new(Translations::builtin()),
            language: hospital_map_core::translations::FALLBACK_LANGUAGE.to_string(),
            images: None,
            errors,
        }
    }

    fn t<'a>(&'a self, key: &'a str) -> &'a str {
        self.translations.get(&self.language, key)
    }
}

impl std::fmt::Debug for PopupContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PopupContext")
            .field("language", &self.language)
            .field("images", &self.images.is_some())
            .finish()
    }
}

struct Rendered {
    html: String,
    // Keeps the thumbnail's local URL alive while the popup exists
    _image: Option<ImageHandle>,
}

/// Popup content generated on first open
pub struct LazyPopup {
    hospital: Hospital,
    context: Arc<PopupContext>,
    rendered: OnceLock<Rendered>,
}

impl LazyPopup {
    pub fn new(hospital: Hospital, context: Arc<PopupContext>) -> Self {
        Self {
            hospital,
            context,
            rendered: OnceLock::new(),
        }
    }

    pub fn hospital_id(&self) -> &str {
        &self.hospital.id
    }

    /// Whether the HTML has been generated yet
    pub fn is_rendered(&self) -> bool {
        self.rendered.get().is_some()
    }

    /// Popup HTML, generated on the first call
    pub fn html(&self) -> &str {
        &self.rendered.get_or_init(|| self.render()).html
    }

    fn render(&self) -> Rendered {
        let ctx = &self.context;
        let h = &self.hospital;
        let gate = &ctx.gate;
        let mut html = String::from("<div class=\"hospital-popup\">");

        let image = h.image_url.as_deref().map(|url| self.thumbnail(url));
        if let Some((src, _)) = &image {
            let _ = write!(
                html,
                "<img class=\"hospital-image\" src=\"{}\" alt=\"{}\" loading=\"lazy\">",
                escape_html(src),
                gate.sanitize(&h.name)
            );
        }

        let _ = write!(html, "<h3>{}</h3>", gate.sanitize(&h.name));
        let _ = write!(
            html,
            "<p><strong>{}:</strong> {}</p>",
            escape_html(ctx.t("popup.address")),
            gate.sanitize(&h.address)
        );
        let _ = write!(
            html,
            "<p><strong>{}:</strong> <span class=\"status status-{}\">{}</span></p>",
            escape_html(ctx.t("popup.status")),
            h.status.key(),
            escape_html(ctx.t(&format!("status.{}", h.status.key())))
        );

        if let Some(website) = h.website.as_deref() {
            if gate.validate_url(website) {
                let _ = write!(
                    html,
                    "<p><a href=\"{}\" target=\"_blank\" rel=\"noopener noreferrer\">{}</a></p>",
                    escape_html(website),
                    escape_html(ctx.t("popup.visitWebsite"))
                );
            } else {
                tracing::debug!(hospital = %h.id, "website link omitted");
            }
        }

        html.push_str("</div>");
        Rendered {
            html,
            _image: image.and_then(|(_, handle)| handle),
        }
    }

    fn thumbnail(&self, url: &str) -> (String, Option<ImageHandle>) {
        let Some(cache) = &self.context.images else {
            return (DEFAULT_IMAGE.to_string(), None);
        };
        if !self.context.gate.validate_url(url) {
            return (DEFAULT_IMAGE.to_string(), None);
        }

        match cache.load_image(url) {
            Ok(handle) => (handle.local_url().to_string(), Some(handle)),
            Err(e) => {
                self.context
                    .errors
                    .handle(&MapError::resource(e.url(), e.to_string()));
                (DEFAULT_IMAGE.to_string(), None)
            }
        }
    }
}

impl std::fmt::Debug for LazyPopup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyPopup")
            .field("hospital", &self.hospital.id)
            .field("rendered", &self.is_rendered())
            .finish()
    }
}

/// Tooltip text for a marker
pub fn tooltip_text(hospital: &Hospital, gate: &SecurityGate) -> String {
    gate.sanitize(&hospital.name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hospital_map_cache::InMemoryUrlRegistry;
    use hospital_map_core::Status;

    fn context() -> Arc<PopupContext> {
        Arc::new(PopupContext::new(Arc::new(SecurityGate::default()), ErrorHandler::new()))
    }

    fn hospital() -> Hospital {
        Hospital::new("h1", 48.85, 2.35, Status::InProgress, "Hôpital Test", "1 Rue X, 75001 Paris, France")
    }

    #[test]
    fn test_not_rendered_until_opened() {
        let popup = LazyPopup::new(hospital(), context());
        assert!(!popup.is_rendered());

        let html = popup.html().to_string();
        assert!(popup.is_rendered());
        assert!(html.contains("<h3>Hôpital Test</h3>"));
        assert!(html.contains("status-inProgress"));
        assert_eq!(popup.html(), html);
    }

    #[test]
    fn test_hostile_name_is_neutralized() {
        let mut h = hospital();
        h.name = "<script>alert(1)</script>Clinic".to_string();
        let popup = LazyPopup::new(h, context());

        assert!(!popup.html().contains("<script"));
        assert!(popup.html().contains("Clinic"));
    }

    #[test]
    fn test_website_only_when_allowed() {
        let popup = LazyPopup::new(hospital().with_website("javascript:alert(1)"), context());
        assert!(!popup.html().contains("<a "));

        let popup = LazyPopup::new(hospital().with_website("https://evil.example.org/"), context());
        assert!(!popup.html().contains("<a "));
    }

    #[test]
    fn test_website_for_configured_host() {
        let config = hospital_map_security::SecurityConfig::default().allow_host("hospital.example.com");
        let ctx = Arc::new(PopupContext::new(Arc::new(SecurityGate::new(config)), ErrorHandler::new()));
        let popup = LazyPopup::new(hospital().with_website("https://hospital.example.com/about"), ctx);

        assert!(popup.html().contains("href=\"https://hospital.example.com/about\""));
        assert!(popup.html().contains("rel=\"noopener noreferrer\""));
    }

    #[test]
    fn test_translated_labels() {
        let mut ctx = PopupContext::new(Arc::new(SecurityGate::default()), ErrorHandler::new());
        ctx.language = "fr".to_string();
        let popup = LazyPopup::new(hospital(), Arc::new(ctx));

        let fr = Translations::builtin();
        assert!(popup.html().contains(fr.get("fr", "popup.address")));
    }

    #[test]
    fn test_thumbnail_failure_falls_back() {
        let fetcher = |_url: &str| -> Result<Vec<u8>, String> { Err("404".to_string()) };
        let config = hospital_map_security::SecurityConfig::default().allow_host("img.example.com");
        let errors = ErrorHandler::new();
        let mut ctx = PopupContext::new(Arc::new(SecurityGate::new(config)), errors.clone());
        ctx.images = Some(ImageCache::new(Arc::new(fetcher), Arc::new(InMemoryUrlRegistry::new())));

        let popup = LazyPopup::new(hospital().with_image_url("https://img.example.com/a.png"), Arc::new(ctx));
        assert!(popup.html().contains(DEFAULT_IMAGE));
        assert_eq!(errors.active_notices().len(), 1);
    }

    #[test]
    fn test_thumbnail_uses_local_url() {
        let fetcher = |_url: &str| -> Result<Vec<u8>, String> { Ok(vec![1, 2, 3]) };
        let config = hospital_map_security::SecurityConfig::default().allow_host("img.example.com");
        let registry = Arc::new(InMemoryUrlRegistry::new());
        let mut ctx = PopupContext::new(Arc::new(SecurityGate::new(config)), ErrorHandler::new());
        ctx.images = Some(ImageCache::new(Arc::new(fetcher), registry.clone()));

        let popup = LazyPopup::new(hospital().with_image_url("https://img.example.com/a.png"), Arc::new(ctx));
        assert!(popup.html().contains("src=\"blob:hospital-map/"));
        assert_eq!(registry.live_count(), 1);
    }

    #[test]
    fn test_tooltip_is_sanitized() {
        let mut h = hospital();
        h.name = "<b>Bold</b> Care".to_string();
        assert_eq!(tooltip_text(&h, &SecurityGate::default()), "Bold Care");
    }
}
