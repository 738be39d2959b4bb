//! Rendering of textual diagrams into images via a remote endpoint.

use crate::{config::DiagramConfig, design::color::Color};
use log::{debug, warn};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::{Arc, Condvar, Mutex},
    thread,
    time::Duration,
};

/// Bumped whenever rendered output changes shape; part of the cache key.
const RENDERER_VERSION: &str = "2";

/// Hard cap on a rendered image.
const MAX_IMAGE_BYTES: usize = 4 * 1024 * 1024;

const MAX_ATTEMPTS: u32 = 3;

/// Diagram languages the rendering endpoint understands.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DiagramDialect {
    Mermaid,
    Plantuml,
    Graphviz,
    D2,
}

/// Style hints forwarded to the renderer.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DiagramStyle {
    /// The renderer-side theme name.
    pub theme: Option<String>,

    /// The background color to use.
    pub background: Option<Color>,
}

/// A rendered raster image.
#[derive(Clone, Debug)]
pub struct RenderedImage {
    pub bytes: Vec<u8>,
    pub mime: String,
    pub width: u32,
    pub height: u32,
}

impl RenderedImage {
    /// The data URL form submitted to the slide API.
    pub fn as_data_url(&self) -> String {
        use base64::{engine::general_purpose::STANDARD, Engine as _};
        format!("data:{};base64,{}", self.mime, STANDARD.encode(&self.bytes))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DiagramError {
    #[error("diagram source is {size} bytes, limit is {limit}")]
    SourceTooLarge { size: usize, limit: usize },

    #[error("rendered image is {size} bytes, limit is {limit}")]
    ImageTooLarge { size: usize, limit: usize },

    #[error("no diagram rendering endpoint is configured")]
    Unconfigured,

    #[error("renderer: {message}")]
    Renderer { message: String, retryable: bool },

    #[error("invalid image from renderer: {0}")]
    InvalidImage(#[from] image::ImageError),
}

impl DiagramError {
    pub fn retryable(&self) -> bool {
        matches!(self, Self::Renderer { retryable: true, .. })
    }
}

/// Client for the diagram rendering endpoint, with a cache in front.
pub struct DiagramRenderer {
    client: Client,
    endpoint: Option<String>,
    auth: Option<String>,
    timeout: Duration,
    max_source_bytes: usize,
    cache: RenderCache,
}

impl DiagramRenderer {
    pub fn new(config: &DiagramConfig, max_source_bytes: usize) -> Self {
        Self {
            client: Client::new(),
            endpoint: config.endpoint.as_ref().map(|url| url.trim_end_matches('/').to_string()),
            auth: config.auth.clone(),
            timeout: Duration::from_millis(config.timeout_ms),
            max_source_bytes,
            cache: RenderCache::new(config.cache_capacity),
        }
    }

    /// Renders a diagram, consulting the cache first.
    pub fn render(
        &self,
        source: &str,
        dialect: DiagramDialect,
        style: &DiagramStyle,
    ) -> Result<Arc<RenderedImage>, DiagramError> {
        if source.len() > self.max_source_bytes {
            return Err(DiagramError::SourceTooLarge {
                size: source.len(),
                limit: self.max_source_bytes,
            });
        }
        let source = canonicalise(source);
        let key = cache_key(&source, &dialect.to_string(), style);
        self.cache.get_or_render(&key, || self.render_upstream(&source, &dialect.to_string(), style))
    }

    /// Renders a chart spec through the same endpoint contract.
    pub fn render_chart(&self, spec: &serde_json::Value) -> Result<Arc<RenderedImage>, DiagramError> {
        let source = spec.to_string();
        let style = DiagramStyle::default();
        let key = cache_key(&source, "chart", &style);
        self.cache.get_or_render(&key, || self.render_upstream(&source, "chart", &style))
    }

    fn render_upstream(
        &self,
        source: &str,
        dialect: &str,
        style: &DiagramStyle,
    ) -> Result<RenderedImage, DiagramError> {
        let Some(endpoint) = &self.endpoint else {
            return Err(DiagramError::Unconfigured);
        };
        let url = format!("{endpoint}/render");
        let body = RenderRequest {
            source,
            dialect,
            output_format: "png",
            theme: style.theme.as_deref(),
            background: style.background.map(|c| c.to_string()),
        };

        let mut attempt = 0;
        let bytes = loop {
            match self.post_once(&url, &body) {
                Ok(bytes) => break bytes,
                Err(error) if error.retryable() && attempt + 1 < MAX_ATTEMPTS => {
                    let delay = Duration::from_secs(1 << attempt);
                    warn!("diagram render attempt {} failed, retrying in {delay:?}: {error}", attempt + 1);
                    thread::sleep(delay);
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        };

        if bytes.len() > MAX_IMAGE_BYTES {
            return Err(DiagramError::ImageTooLarge { size: bytes.len(), limit: MAX_IMAGE_BYTES });
        }
        let mime = match image::guess_format(&bytes) {
            Ok(image::ImageFormat::Png) => "image/png",
            Ok(image::ImageFormat::Jpeg) => "image/jpeg",
            Ok(image::ImageFormat::Gif) => "image/gif",
            _ => "application/octet-stream",
        };
        let decoded = image::load_from_memory(&bytes)?;
        Ok(RenderedImage {
            width: decoded.width(),
            height: decoded.height(),
            mime: mime.into(),
            bytes,
        })
    }

    fn post_once(&self, url: &str, body: &RenderRequest<'_>) -> Result<Vec<u8>, DiagramError> {
        let mut request = self.client.post(url).timeout(self.timeout).json(body);
        if let Some(token) = &self.auth {
            request = request.bearer_auth(token);
        }
        let response = request.send().map_err(|error| DiagramError::Renderer {
            message: error.to_string(),
            retryable: error.is_timeout() || error.is_connect(),
        })?;
        let status = response.status();
        if !status.is_success() {
            let retryable = status.is_server_error() || status.as_u16() == 429;
            let message = response.text().unwrap_or_else(|_| "unknown error".to_string());
            return Err(DiagramError::Renderer {
                message: format!("{status}: {message}"),
                retryable,
            });
        }
        Ok(response.bytes().map_err(|error| DiagramError::Renderer {
            message: error.to_string(),
            retryable: true,
        })?.to_vec())
    }
}

#[derive(Serialize)]
struct RenderRequest<'a> {
    source: &'a str,
    dialect: &'a str,
    output_format: &'a str,

    #[serde(skip_serializing_if = "Option::is_none")]
    theme: Option<&'a str>,

    #[serde(skip_serializing_if = "Option::is_none")]
    background: Option<String>,
}

/// Normalises line endings and strips per-line whitespace so equivalent
/// sources share a cache entry.
fn canonicalise(source: &str) -> String {
    source.lines().map(str::trim).collect::<Vec<_>>().join("\n")
}

fn cache_key(source: &str, dialect: &str, style: &DiagramStyle) -> String {
    let mut hasher = Sha256::new();
    hasher.update(RENDERER_VERSION.as_bytes());
    hasher.update([0]);
    hasher.update(dialect.as_bytes());
    hasher.update([0]);
    hasher.update(source.as_bytes());
    hasher.update([0]);
    hasher.update(serde_json::to_string(style).unwrap_or_default().as_bytes());
    hex::encode(hasher.finalize())
}

/// Bounded render cache with single-flight semantics: concurrent misses on
/// one key collapse into a single upstream render.
struct RenderCache {
    state: Mutex<CacheState>,
    signal: Condvar,
    capacity: usize,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, Arc<RenderedImage>>,
    order: VecDeque<String>,
    in_flight: HashSet<String>,
}

impl RenderCache {
    fn new(capacity: usize) -> Self {
        Self { state: Mutex::new(CacheState::default()), signal: Condvar::new(), capacity: capacity.max(1) }
    }

    fn get_or_render<F>(&self, key: &str, render: F) -> Result<Arc<RenderedImage>, DiagramError>
    where
        F: FnOnce() -> Result<RenderedImage, DiagramError>,
    {
        let mut state = self.state.lock().expect("lock poisoned");
        loop {
            if let Some(hit) = state.entries.get(key) {
                debug!("diagram cache hit for {key}");
                let hit = hit.clone();
                touch(&mut state.order, key);
                return Ok(hit);
            }
            if state.in_flight.contains(key) {
                state = self.signal.wait(state).expect("lock poisoned");
                continue;
            }
            break;
        }
        state.in_flight.insert(key.to_string());
        drop(state);

        let result = render();

        let mut state = self.state.lock().expect("lock poisoned");
        state.in_flight.remove(key);
        let outcome = match result {
            Ok(image) => {
                let image = Arc::new(image);
                state.entries.insert(key.to_string(), image.clone());
                state.order.push_back(key.to_string());
                while state.entries.len() > self.capacity {
                    if let Some(evicted) = state.order.pop_front() {
                        state.entries.remove(&evicted);
                    }
                }
                Ok(image)
            }
            Err(error) => Err(error),
        };
        self.signal.notify_all();
        outcome
    }
}

fn touch(order: &mut VecDeque<String>, key: &str) {
    if let Some(position) = order.iter().position(|k| k == key) {
        order.remove(position);
        order.push_back(key.to_string());
    }
}
