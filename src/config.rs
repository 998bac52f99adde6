//! Configuration types: how to reach the backend, and how to render the page.
//!
//! Two structs live here because they change at different rates:
//!
//! * [`ClientConfig`]: connection settings (base URL, timeouts, poll
//!   interval, upload limit). Fixed for the life of a controller; built via
//!   [`ClientConfigBuilder`].
//! * [`RenderConfig`]: the user's cosmetic choices (font, paper, ink,
//!   imperfection). Edited freely between runs and sent verbatim to the
//!   backend when a conversion starts. Partial edits go through
//!   [`RenderConfigPatch`].

use crate::error::ClientError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Backend path prefix every endpoint lives under.
pub const API_PREFIX: &str = "/api/v1";

/// Upload limit enforced before any bytes leave the machine (50 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

/// Connection settings for [`crate::gateway::HttpGateway`] and the poll loop.
///
/// # Example
/// ```rust
/// use handwriting_client::ClientConfig;
///
/// let config = ClientConfig::builder()
///     .base_url("http://localhost:8000")
///     .poll_interval_ms(1000)
///     .build()
///     .unwrap();
/// assert_eq!(config.api_base(), "http://localhost:8000/api/v1");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Scheme + host (+ port) of the backend, without the `/api/v1` prefix.
    /// Default: `http://localhost:8000`.
    pub base_url: String,

    /// Timeout for status, start and listing calls, in seconds. Default: 30.
    pub request_timeout_secs: u64,

    /// Timeout for upload and download calls, in seconds. Default: 300.
    ///
    /// A 50 MiB upload over a slow link legitimately takes minutes; using the
    /// short request timeout here would fail healthy uploads.
    pub transfer_timeout_secs: u64,

    /// Delay between two status polls, in milliseconds. Default: 1000.
    ///
    /// Polls never overlap: the next delay starts only after the previous
    /// response (or failure) has been handled.
    pub poll_interval_ms: u64,

    /// Largest file accepted for upload, in bytes. Default: 50 MiB.
    pub max_upload_bytes: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            request_timeout_secs: 30,
            transfer_timeout_secs: 300,
            poll_interval_ms: 1000,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl ClientConfig {
    /// Create a new builder for `ClientConfig`.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder {
            config: Self::default(),
        }
    }

    /// `{base_url}/api/v1`, with any trailing slash on the base removed.
    pub fn api_base(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), API_PREFIX)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs.max(1);
        self
    }

    pub fn transfer_timeout_secs(mut self, secs: u64) -> Self {
        self.config.transfer_timeout_secs = secs.max(1);
        self
    }

    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    pub fn max_upload_bytes(mut self, bytes: u64) -> Self {
        self.config.max_upload_bytes = bytes;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ClientConfig, ClientError> {
        let c = &self.config;
        let url = c.base_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ClientError::InvalidConfig(format!(
                "base URL must start with http:// or https://, got '{}'",
                c.base_url
            )));
        }
        if c.poll_interval_ms < 50 {
            return Err(ClientError::InvalidConfig(format!(
                "poll interval must be ≥ 50ms, got {}ms",
                c.poll_interval_ms
            )));
        }
        if c.max_upload_bytes == 0 {
            return Err(ClientError::InvalidConfig(
                "upload limit must be > 0 bytes".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Render configuration ─────────────────────────────────────────────────

/// Cosmetic rendering choices sent to the backend at job start.
///
/// Serialised with snake_case keys, exactly as the backend's `ProcessConfig`
/// expects. Values are not validated here; callers (the CLI parser, a form)
/// restrict them to the ranges the backend accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderConfig {
    pub handwriting_style: HandwritingStyle,
    pub paper_type: PaperType,
    /// Jitter applied to glyph placement. Intended range: 0.0–0.2.
    pub imperfection_level: f32,
    pub ink_color: InkColor,
    /// Pixels between ruled lines. The backend accepts 20–40.
    pub line_spacing: u32,
    /// Glyph size in points. The backend accepts 12–32.
    pub font_size: u32,
    pub enable_smudges: bool,
    pub enable_coffee_stains: bool,
    pub enable_page_shadows: bool,
    pub enable_annotations: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            handwriting_style: HandwritingStyle::default(),
            paper_type: PaperType::default(),
            imperfection_level: 0.07,
            ink_color: InkColor::default(),
            line_spacing: 28,
            font_size: 18,
            enable_smudges: true,
            enable_coffee_stains: false,
            enable_page_shadows: true,
            enable_annotations: false,
        }
    }
}

impl RenderConfig {
    /// Overwrite only the fields set in `patch`.
    pub fn merge(&mut self, patch: RenderConfigPatch) {
        let RenderConfigPatch {
            handwriting_style,
            paper_type,
            imperfection_level,
            ink_color,
            line_spacing,
            font_size,
            enable_smudges,
            enable_coffee_stains,
            enable_page_shadows,
            enable_annotations,
        } = patch;

        if let Some(v) = handwriting_style {
            self.handwriting_style = v;
        }
        if let Some(v) = paper_type {
            self.paper_type = v;
        }
        if let Some(v) = imperfection_level {
            self.imperfection_level = v;
        }
        if let Some(v) = ink_color {
            self.ink_color = v;
        }
        if let Some(v) = line_spacing {
            self.line_spacing = v;
        }
        if let Some(v) = font_size {
            self.font_size = v;
        }
        if let Some(v) = enable_smudges {
            self.enable_smudges = v;
        }
        if let Some(v) = enable_coffee_stains {
            self.enable_coffee_stains = v;
        }
        if let Some(v) = enable_page_shadows {
            self.enable_page_shadows = v;
        }
        if let Some(v) = enable_annotations {
            self.enable_annotations = v;
        }
    }
}

/// A partial [`RenderConfig`]: `None` fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfigPatch {
    pub handwriting_style: Option<HandwritingStyle>,
    pub paper_type: Option<PaperType>,
    pub imperfection_level: Option<f32>,
    pub ink_color: Option<InkColor>,
    pub line_spacing: Option<u32>,
    pub font_size: Option<u32>,
    pub enable_smudges: Option<bool>,
    pub enable_coffee_stains: Option<bool>,
    pub enable_page_shadows: Option<bool>,
    pub enable_annotations: Option<bool>,
}

impl RenderConfigPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Handwriting fonts the backend ships with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HandwritingStyle {
    #[default]
    Caveat,
    #[serde(rename = "Indie Flower")]
    IndieFlower,
    #[serde(rename = "Permanent Marker")]
    PermanentMarker,
    #[serde(rename = "Shadows Into Light")]
    ShadowsIntoLight,
    #[serde(rename = "Patrick Hand")]
    PatrickHand,
    #[serde(rename = "Reenie Beanie")]
    ReenieBeanie,
    #[serde(rename = "Covered By Your Grace")]
    CoveredByYourGrace,
    #[serde(rename = "Homemade Apple")]
    HomemadeApple,
}

impl HandwritingStyle {
    /// The font family name as sent on the wire.
    pub fn font_name(self) -> &'static str {
        match self {
            HandwritingStyle::Caveat => "Caveat",
            HandwritingStyle::IndieFlower => "Indie Flower",
            HandwritingStyle::PermanentMarker => "Permanent Marker",
            HandwritingStyle::ShadowsIntoLight => "Shadows Into Light",
            HandwritingStyle::PatrickHand => "Patrick Hand",
            HandwritingStyle::ReenieBeanie => "Reenie Beanie",
            HandwritingStyle::CoveredByYourGrace => "Covered By Your Grace",
            HandwritingStyle::HomemadeApple => "Homemade Apple",
        }
    }
}

/// Paper texture behind the handwriting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaperType {
    #[default]
    Lined,
    Graph,
    Blank,
    Engineering,
}

/// Fixed ink palette, serialised as the hex colour the backend draws with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InkColor {
    #[default]
    #[serde(rename = "#1a1a2e")]
    Midnight,
    #[serde(rename = "#000000")]
    Black,
    #[serde(rename = "#1e3a8a")]
    Blue,
    #[serde(rename = "#7f1d1d")]
    Red,
    #[serde(rename = "#14532d")]
    Green,
    #[serde(rename = "#4c1d95")]
    Purple,
}

impl InkColor {
    pub fn hex(self) -> &'static str {
        match self {
            InkColor::Midnight => "#1a1a2e",
            InkColor::Black => "#000000",
            InkColor::Blue => "#1e3a8a",
            InkColor::Red => "#7f1d1d",
            InkColor::Green => "#14532d",
            InkColor::Purple => "#4c1d95",
        }
    }
}

/// Output format for `GET /download/{job_id}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Pdf,
    Png,
    Jpg,
}

impl ExportFormat {
    /// Query-string value and file extension.
    pub fn as_str(self) -> &'static str {
        match self {
            ExportFormat::Pdf => "pdf",
            ExportFormat::Png => "png",
            ExportFormat::Jpg => "jpg",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_config_defaults() {
        let c = ClientConfig::default();
        assert_eq!(c.api_base(), "http://localhost:8000/api/v1");
        assert_eq!(c.poll_interval(), Duration::from_secs(1));
        assert_eq!(c.max_upload_bytes, 52_428_800);
    }

    #[test]
    fn api_base_strips_trailing_slash() {
        let c = ClientConfig::builder()
            .base_url("https://render.example.com/")
            .build()
            .unwrap();
        assert_eq!(c.api_base(), "https://render.example.com/api/v1");
    }

    #[test]
    fn builder_rejects_bad_url() {
        let err = ClientConfig::builder()
            .base_url("localhost:8000")
            .build()
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidConfig(_)));
    }

    #[test]
    fn builder_rejects_tiny_poll_interval() {
        let err = ClientConfig::builder()
            .poll_interval_ms(10)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("poll interval"));
    }

    #[test]
    fn render_config_wire_format() {
        let json = serde_json::to_value(RenderConfig::default()).unwrap();
        assert_eq!(json["handwriting_style"], "Caveat");
        assert_eq!(json["paper_type"], "lined");
        assert_eq!(json["ink_color"], "#1a1a2e");
        assert_eq!(json["line_spacing"], 28);
        assert_eq!(json["font_size"], 18);
        assert_eq!(json["enable_smudges"], true);
        assert_eq!(json["enable_coffee_stains"], false);
    }

    #[test]
    fn multi_word_fonts_use_display_names() {
        let json = serde_json::to_value(HandwritingStyle::CoveredByYourGrace).unwrap();
        assert_eq!(json, "Covered By Your Grace");
        assert_eq!(
            HandwritingStyle::CoveredByYourGrace.font_name(),
            "Covered By Your Grace"
        );
    }

    #[test]
    fn merge_changes_only_patched_fields() {
        let mut config = RenderConfig {
            paper_type: PaperType::Graph,
            font_size: 24,
            ..RenderConfig::default()
        };
        let before = config.clone();

        config.merge(RenderConfigPatch {
            ink_color: Some(InkColor::Black),
            ..Default::default()
        });

        assert_eq!(config.ink_color, InkColor::Black);
        assert_eq!(
            RenderConfig {
                ink_color: before.ink_color,
                ..config.clone()
            },
            before
        );
    }

    #[test]
    fn empty_patch_is_noop() {
        let mut config = RenderConfig::default();
        let patch = RenderConfigPatch::default();
        assert!(patch.is_empty());
        config.merge(patch);
        assert_eq!(config, RenderConfig::default());
    }

    #[test]
    fn patch_deserialises_from_partial_json() {
        let patch: RenderConfigPatch =
            serde_json::from_str(r##"{"ink_color": "#000000"}"##).unwrap();
        assert_eq!(patch.ink_color, Some(InkColor::Black));
        assert_eq!(patch.paper_type, None);
    }

    #[test]
    fn ink_hex_matches_serde() {
        for ink in [
            InkColor::Midnight,
            InkColor::Black,
            InkColor::Blue,
            InkColor::Red,
            InkColor::Green,
            InkColor::Purple,
        ] {
            assert_eq!(serde_json::to_value(ink).unwrap(), ink.hex());
        }
    }
}
