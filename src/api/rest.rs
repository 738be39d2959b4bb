//! The REST implementation of the slide transport.

use super::{
    ApiError, CallBudget, DeckHandle, DeckInfo, ElementInfo, ElementOp, SlideHandle, SlideInfo,
    SlideTransport,
};
use crate::{config::UpstreamConfig, deck::AbsoluteBox, theme::resolve::ResolvedTextStyle};
use log::debug;
use reqwest::{
    blocking::{Client, RequestBuilder, Response},
    header::RETRY_AFTER,
    Method, StatusCode,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// JSON-over-HTTP transport against the configured presentation service.
pub struct RestTransport {
    client: Client,
    base_url: String,
    token: Option<String>,
    budget: CallBudget,
    max_batch_size: usize,
}

impl RestTransport {
    pub fn new(config: &UpstreamConfig, budget: CallBudget) -> Result<Self, ApiError> {
        let base_url = config.base_url.as_ref().ok_or_else(|| ApiError::Permanent {
            status: None,
            message: "upstream.base_url is not configured".into(),
        })?;
        Ok(Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: config.auth.clone(),
            budget,
            max_batch_size: config.max_batch_size,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{path}", self.base_url);
        let mut builder = self
            .client
            .request(method, url)
            .timeout(self.budget.per_call_timeout(DEFAULT_CALL_TIMEOUT));
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    fn send<T: for<'de> Deserialize<'de>>(&self, builder: RequestBuilder) -> Result<T, ApiError> {
        let response = builder.send().map_err(transport_error)?;
        let response = check_status(response)?;
        response.json().map_err(|error| ApiError::Transient { message: error.to_string() })
    }

    fn send_empty(&self, builder: RequestBuilder) -> Result<(), ApiError> {
        let response = builder.send().map_err(transport_error)?;
        check_status(response)?;
        Ok(())
    }
}

fn transport_error(error: reqwest::Error) -> ApiError {
    // Network-level failures are worth retrying; anything the server
    // answered goes through status classification instead.
    ApiError::Transient { message: error.to_string() }
}

fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let retry_after = parse_retry_after(&response);
    let body = response.text().unwrap_or_default();
    let message = extract_message(&body).unwrap_or_else(|| {
        if body.is_empty() { status.to_string() } else { body.clone() }
    });
    Err(ApiError::from_status(status.as_u16(), message, retry_after))
}

fn parse_retry_after(response: &Response) -> Option<Duration> {
    let value = response.headers().get(RETRY_AFTER)?.to_str().ok()?;
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

/// Digs the human-readable message out of a JSON error body.
fn extract_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .pointer("/error/message")
        .or_else(|| value.pointer("/message"))
        .and_then(Value::as_str)
        .map(ToOwned::to_owned)
}

fn box_json(rect: &AbsoluteBox) -> Value {
    json!({ "x": rect.x, "y": rect.y, "width": rect.width, "height": rect.height })
}

fn style_json(style: &ResolvedTextStyle) -> Value {
    json!({
        "font_family": style.font_family,
        "font_size": style.font_size,
        "bold": style.bold,
        "italic": style.italic,
        "color": style.color.to_string(),
        "line_height": style.line_height,
    })
}

fn op_json(op: &ElementOp) -> Value {
    match op {
        ElementOp::TextBox { text, rect, style } => json!({
            "type": "text_box",
            "text": text,
            "box": box_json(rect),
            "style": style_json(style),
        }),
        ElementOp::Image { url, rect } => json!({
            "type": "image",
            "url": url,
            "box": box_json(rect),
        }),
        ElementOp::Shape { shape, rect, fill } => json!({
            "type": "shape",
            "shape": shape.to_string(),
            "box": box_json(rect),
            "fill": fill.map(|c| c.to_string()),
        }),
        ElementOp::Table { rect, rows, cols } => json!({
            "type": "table",
            "box": box_json(rect),
            "rows": rows,
            "cols": cols,
        }),
        ElementOp::Chart { spec, rect } => json!({
            "type": "chart",
            "spec": spec,
            "box": box_json(rect),
        }),
    }
}

#[derive(Deserialize)]
struct RestDeck {
    deck_id: String,
    url: String,
}

#[derive(Deserialize)]
struct RestSlide {
    slide_id: String,
    index: usize,
}

#[derive(Deserialize)]
struct RestElement {
    element_id: String,
}

#[derive(Deserialize)]
struct RestBatchResponse {
    results: Vec<RestBatchEntry>,
}

#[derive(Deserialize)]
struct RestBatchEntry {
    element_id: Option<String>,
    error: Option<RestBatchError>,
}

#[derive(Deserialize)]
struct RestBatchError {
    status: Option<u16>,
    message: String,
}

#[derive(Deserialize)]
struct RestDeckInfo {
    deck_id: String,
    title: String,
    url: String,
    #[serde(default)]
    slides: Vec<RestSlideInfo>,
}

#[derive(Deserialize)]
struct RestSlideInfo {
    slide_id: String,
    index: usize,
    #[serde(default)]
    elements: Vec<RestElementInfo>,
}

#[derive(Deserialize)]
struct RestElementInfo {
    element_id: String,
    #[serde(default)]
    kind: String,
}

impl SlideTransport for RestTransport {
    fn create_deck(&self, title: &str) -> Result<DeckHandle, ApiError> {
        debug!("creating deck '{title}'");
        let deck: RestDeck =
            self.send(self.request(Method::POST, "/v1/decks").json(&json!({ "title": title })))?;
        Ok(DeckHandle { deck_id: deck.deck_id, url: deck.url })
    }

    fn append_slide(&self, deck_id: &str, layout_hint: Option<&str>) -> Result<SlideHandle, ApiError> {
        let slide: RestSlide = self.send(
            self.request(Method::POST, &format!("/v1/decks/{deck_id}/slides"))
                .json(&json!({ "layout_hint": layout_hint })),
        )?;
        Ok(SlideHandle { slide_id: slide.slide_id, index: slide.index })
    }

    fn insert_element(&self, slide_id: &str, op: &ElementOp) -> Result<String, ApiError> {
        let element: RestElement = self.send(
            self.request(Method::POST, &format!("/v1/slides/{slide_id}/elements")).json(&op_json(op)),
        )?;
        Ok(element.element_id)
    }

    fn insert_batch(&self, slide_id: &str, ops: &[ElementOp]) -> Result<Vec<Result<String, ApiError>>, ApiError> {
        let elements: Vec<Value> = ops.iter().map(op_json).collect();
        let response: RestBatchResponse = self.send(
            self.request(Method::POST, &format!("/v1/slides/{slide_id}/elements:batch"))
                .json(&json!({ "elements": elements })),
        )?;
        if response.results.len() != ops.len() {
            return Err(ApiError::Transient {
                message: format!(
                    "batch returned {} results for {} elements",
                    response.results.len(),
                    ops.len()
                ),
            });
        }
        Ok(response
            .results
            .into_iter()
            .map(|entry| match (entry.element_id, entry.error) {
                (Some(element_id), _) => Ok(element_id),
                (None, Some(error)) => Err(ApiError::from_status(
                    error.status.unwrap_or(StatusCode::BAD_REQUEST.as_u16()),
                    error.message,
                    None,
                )),
                (None, None) => {
                    Err(ApiError::Transient { message: "batch entry had no id and no error".into() })
                }
            })
            .collect())
    }

    fn fill_table_cell(
        &self,
        slide_id: &str,
        table_id: &str,
        row: usize,
        col: usize,
        text: &str,
        style: &ResolvedTextStyle,
    ) -> Result<(), ApiError> {
        self.send_empty(
            self.request(Method::POST, &format!("/v1/slides/{slide_id}/tables/{table_id}/cells"))
                .json(&json!({
                    "row": row,
                    "col": col,
                    "text": text,
                    "style": style_json(style),
                })),
        )
    }

    fn update_text_style(
        &self,
        slide_id: &str,
        element_id: &str,
        style: &ResolvedTextStyle,
    ) -> Result<(), ApiError> {
        self.send_empty(
            self.request(Method::PATCH, &format!("/v1/slides/{slide_id}/elements/{element_id}"))
                .json(&json!({ "style": style_json(style) })),
        )
    }

    fn set_title(&self, deck_id: &str, title: &str) -> Result<(), ApiError> {
        self.send_empty(
            self.request(Method::PATCH, &format!("/v1/decks/{deck_id}"))
                .json(&json!({ "title": title })),
        )
    }

    fn get_deck_info(&self, deck_id: &str) -> Result<DeckInfo, ApiError> {
        let info: RestDeckInfo =
            self.send(self.request(Method::GET, &format!("/v1/decks/{deck_id}")))?;
        Ok(DeckInfo {
            deck_id: info.deck_id,
            title: info.title,
            url: info.url,
            slides: info
                .slides
                .into_iter()
                .map(|slide| SlideInfo {
                    slide_id: slide.slide_id,
                    index: slide.index,
                    elements: slide
                        .elements
                        .into_iter()
                        .map(|element| ElementInfo { element_id: element.element_id, kind: element.kind })
                        .collect(),
                })
                .collect(),
        })
    }

    fn supports_batching(&self) -> bool {
        self.max_batch_size > 1
    }
}
