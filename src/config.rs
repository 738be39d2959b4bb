use crate::design::metrics::SlideDimensions;
use serde::Deserialize;
use std::{fs, io, path::Path, path::PathBuf};

/// Engine configuration, loaded from YAML.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// The upstream presentation API.
    #[serde(default)]
    pub upstream: UpstreamConfig,

    #[serde(default)]
    pub diagram: DiagramConfig,

    #[serde(default)]
    pub layout: LayoutConfig,

    #[serde(default)]
    pub theme: ThemeConfig,

    #[serde(default)]
    pub limits: LimitsConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load the config from a path.
    pub fn load(path: &Path) -> Result<Self, ConfigLoadError> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(ConfigLoadError::NotFound),
            Err(e) => return Err(e.into()),
        };
        let config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("io: {0}")]
    Io(#[from] io::Error),

    #[error("config file not found")]
    NotFound,

    #[error("invalid configuration: {0}")]
    Invalid(#[from] serde_yaml::Error),
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpstreamConfig {
    /// Base URL of the presentation API. Required for any real generation.
    pub base_url: Option<String>,

    /// Bearer token for the API.
    #[serde(default)]
    pub auth: Option<String>,

    #[serde(default = "default_per_minute_limit")]
    pub per_minute_limit: u32,

    #[serde(default = "default_per_day_limit")]
    pub per_day_limit: u32,

    /// Maximum element mutations folded into one batched request.
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,

    /// Whether the API accepts native chart specs; otherwise charts render
    /// as images.
    #[serde(default)]
    pub supports_charts: bool,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            auth: None,
            per_minute_limit: default_per_minute_limit(),
            per_day_limit: default_per_day_limit(),
            max_batch_size: default_max_batch_size(),
            supports_charts: false,
        }
    }
}

fn default_per_minute_limit() -> u32 {
    60
}

fn default_per_day_limit() -> u32 {
    5000
}

fn default_max_batch_size() -> usize {
    20
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DiagramConfig {
    /// Base URL of the diagram rendering endpoint.
    pub endpoint: Option<String>,

    /// Bearer token for the rendering endpoint.
    #[serde(default)]
    pub auth: Option<String>,

    #[serde(default = "default_diagram_timeout_ms")]
    pub timeout_ms: u64,

    /// Rendered diagrams kept in the in-process cache.
    #[serde(default = "default_diagram_cache_capacity")]
    pub cache_capacity: usize,
}

impl Default for DiagramConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            auth: None,
            timeout_ms: default_diagram_timeout_ms(),
            cache_capacity: default_diagram_cache_capacity(),
        }
    }
}

pub(crate) fn default_diagram_timeout_ms() -> u64 {
    10_000
}

pub(crate) fn default_diagram_cache_capacity() -> usize {
    128
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LayoutConfig {
    /// Template used when neither the deck nor the slide names a layout.
    #[serde(default = "default_template")]
    pub default_template: String,

    #[serde(default)]
    pub standard_slide: SlideDimensions,

    /// Concurrent element inserts within one slide.
    #[serde(default = "default_parallelism_per_slide")]
    pub parallelism_per_slide: usize,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            default_template: default_template(),
            standard_slide: SlideDimensions::default(),
            parallelism_per_slide: default_parallelism_per_slide(),
        }
    }
}

fn default_template() -> String {
    "single-column".into()
}

pub(crate) fn default_parallelism_per_slide() -> usize {
    4
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ThemeConfig {
    /// Directories of theme JSON files seeded into the registry at startup.
    #[serde(default)]
    pub builtins: Vec<PathBuf>,

    /// The initially active theme.
    #[serde(default = "default_theme_id")]
    pub default_id: String,
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self { builtins: Vec::new(), default_id: default_theme_id() }
    }
}

fn default_theme_id() -> String {
    crate::theme::registry::DEFAULT_THEME_ID.into()
}

#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LimitsConfig {
    #[serde(default = "default_max_slides")]
    pub max_slides: usize,

    #[serde(default = "default_max_content_items")]
    pub max_content_items_per_slide: usize,

    #[serde(default = "default_max_text_len")]
    pub max_text_len: usize,

    #[serde(default = "default_max_chart_rows")]
    pub max_chart_rows: usize,

    #[serde(default = "default_max_diagram_source_bytes")]
    pub max_diagram_source_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_slides: default_max_slides(),
            max_content_items_per_slide: default_max_content_items(),
            max_text_len: default_max_text_len(),
            max_chart_rows: default_max_chart_rows(),
            max_diagram_source_bytes: default_max_diagram_source_bytes(),
        }
    }
}

fn default_max_slides() -> usize {
    300
}

fn default_max_content_items() -> usize {
    50
}

fn default_max_text_len() -> usize {
    50_000
}

fn default_max_chart_rows() -> usize {
    10_000
}

fn default_max_diagram_source_bytes() -> usize {
    16_384
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ObservabilityConfig {
    #[serde(default)]
    pub log_level: LogLevel,

    /// Emit one event per created element rather than per slide.
    #[serde(default)]
    pub emit_element_events: bool,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Debug,

    #[default]
    Info,

    Warn,

    Error,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Error => log::LevelFilter::Error,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_match_their_functions() {
        let config = Config::default();
        assert_eq!(config.upstream.per_minute_limit, 60);
        assert_eq!(config.diagram.timeout_ms, 10_000);
        assert_eq!(config.layout.parallelism_per_slide, 4);
        assert_eq!(config.limits.max_slides, 300);
        assert_eq!(config.theme.default_id, "default");
    }

    #[test]
    fn partial_yaml_fills_in_defaults() {
        let config: Config = serde_yaml::from_str(
            "upstream:\n  base_url: https://slides.example.com\n  per_minute_limit: 10\n",
        )
        .expect("failed to parse");
        assert_eq!(config.upstream.base_url.as_deref(), Some("https://slides.example.com"));
        assert_eq!(config.upstream.per_minute_limit, 10);
        assert_eq!(config.upstream.per_day_limit, 5000);
        assert_eq!(config.limits.max_text_len, 50_000);
    }

    #[test]
    fn unknown_options_are_rejected() {
        serde_yaml::from_str::<Config>("upstram: {}\n").expect_err("parse succeeded");
        serde_yaml::from_str::<Config>("upstream:\n  rate: 3\n").expect_err("parse succeeded");
    }

    #[test]
    fn log_levels_parse() {
        let config: Config =
            serde_yaml::from_str("observability:\n  log_level: warn\n").expect("failed to parse");
        assert_eq!(config.observability.log_level, LogLevel::Warn);
    }
}
