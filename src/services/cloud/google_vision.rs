use std::io::Cursor;

use anyhow::{anyhow, bail, Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use eframe::egui;
use image::{ImageFormat, RgbaImage};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    config::Config,
    services::ServiceJob,
    text::{self, CloudBlock, CloudText, Page, Paragraph, Symbol, Word},
};

use super::{CloudModel, CloudOcrService, CloudOcrServiceJob, CloudOptions};

const DEFAULT_ENDPOINT: &str = "https://vision.googleapis.com/v1/images:annotate";
const API_KEY_ENV: &str = "HANDLESNAP_VISION_API_KEY";

/// Document text detection through the Google Cloud Vision REST API.
#[derive(Default)]
pub struct GoogleVision {
    config: GoogleVisionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleVisionConfig {
    api_key: String,
    endpoint: String,
}

impl Default for GoogleVisionConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            endpoint: DEFAULT_ENDPOINT.to_owned(),
        }
    }
}

impl GoogleVisionConfig {
    /// The configured API key, or the one from the environment when none is configured.
    fn api_key(&self) -> Result<String> {
        if !self.api_key.is_empty() {
            return Ok(self.api_key.clone());
        }

        match std::env::var(API_KEY_ENV) {
            Ok(key) if !key.is_empty() => Ok(key),
            _ => bail!("GoogleVision: No API key configured, and `{API_KEY_ENV}` is not set"),
        }
    }
}

impl Config for GoogleVisionConfig {
    fn path() -> &'static str {
        "cloud_services/google_vision.json"
    }

    fn show_ui(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.label("API Key:");
            ui.add(egui::TextEdit::singleline(&mut self.api_key).password(true));
        });
        ui.horizontal(|ui| {
            ui.label("Endpoint:");
            ui.text_edit_singleline(&mut self.endpoint);
        });
    }
}

impl CloudOcrService for GoogleVision {
    fn name(&self) -> &'static str {
        "Google Cloud Vision"
    }

    fn init(&mut self) -> Result<()> {
        self.config = GoogleVisionConfig::load()
            .context("GoogleVision: Failed to load configuration file")?;
        Ok(())
    }

    fn terminate(&mut self) -> Result<()> {
        self.config
            .save()
            .context("GoogleVision: Failed to save configuration file")?;
        Ok(())
    }

    fn show_config_ui(&mut self, ui: &mut egui::Ui) {
        self.config.show_ui(ui);
    }

    fn recognize(&mut self, image: RgbaImage, options: CloudOptions) -> CloudOcrServiceJob {
        let config = self.config.clone();

        ServiceJob::new(move || {
            let api_key = config.api_key()?;

            let mut buf = Cursor::new(Vec::new());
            image
                .write_to(&mut buf, ImageFormat::Png)
                .context("GoogleVision: Failed to encode image as PNG")?;

            let body = request_body(&BASE64.encode(buf.into_inner()), options);

            let response = attohttpc::post(&config.endpoint)
                .param("key", &api_key)
                .json(&body)
                .context("GoogleVision: Failed to serialise request")?
                .send()
                .context("GoogleVision: Failed to send http request")?;

            let status = response.status();
            let text = response
                .text()
                .context("GoogleVision: Failed to read response body")?;

            if !status.is_success() {
                return Err(request_error(status.as_u16(), &text));
            }

            let response: Value = serde_json::from_str(&text)
                .context("GoogleVision: Response from server is not valid json")?;

            parse_response(response)
        })
    }
}

fn request_body(image_base64: &str, options: CloudOptions) -> Value {
    let model = match options.model {
        CloudModel::Latest => "builtin/latest",
        CloudModel::Stable => "builtin/stable",
    };

    json!({
        "requests": [{
            "image": { "content": image_base64 },
            "features": [{
                "type": "DOCUMENT_TEXT_DETECTION",
                "maxResults": options.max_results,
                "model": model
            }]
        }]
    })
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: Status,
}

/// A failed request, with the API's explanation when the body carries one.
fn request_error(status: u16, body: &str) -> anyhow::Error {
    match serde_json::from_str::<ErrorResponse>(body) {
        Ok(ErrorResponse { error }) if !error.message.is_empty() => anyhow!(
            "GoogleVision: Request failed with status {status}: {}",
            error.message
        ),
        _ => anyhow!("GoogleVision: Request failed with status {status}"),
    }
}

#[derive(Debug, Deserialize)]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<ImageResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageResponse {
    full_text_annotation: Option<Annotation>,
    error: Option<Status>,
}

#[derive(Debug, Deserialize)]
struct Status {
    #[serde(default)]
    code: i32,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct Annotation {
    #[serde(default)]
    pages: Vec<ApiPage>,
}

#[derive(Debug, Deserialize)]
struct ApiPage {
    #[serde(default)]
    blocks: Vec<ApiBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiBlock {
    bounding_box: Option<BoundingPoly>,
    #[serde(default)]
    paragraphs: Vec<ApiParagraph>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiParagraph {
    bounding_box: Option<BoundingPoly>,
    #[serde(default)]
    words: Vec<ApiWord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiWord {
    bounding_box: Option<BoundingPoly>,
    #[serde(default)]
    symbols: Vec<ApiSymbol>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiSymbol {
    bounding_box: Option<BoundingPoly>,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct BoundingPoly {
    #[serde(default)]
    vertices: Vec<Vertex>,
}

// the API leaves out coordinates which are 0
#[derive(Debug, Deserialize)]
struct Vertex {
    #[serde(default)]
    x: f32,
    #[serde(default)]
    y: f32,
}

impl BoundingPoly {
    fn rect(&self) -> Option<egui::Rect> {
        let vertices: Vec<_> = self.vertices.iter().map(|v| (v.x, v.y)).collect();
        text::rect_from_vertices(&vertices)
    }
}

fn rect(poly: &Option<BoundingPoly>) -> Option<egui::Rect> {
    poly.as_ref().and_then(BoundingPoly::rect)
}

fn parse_response(value: Value) -> Result<CloudText> {
    let response: AnnotateResponse = serde_json::from_value(value)
        .context("GoogleVision: Response from server has an unexpected shape")?;

    let image = response
        .responses
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("GoogleVision: Response did not contain any image result"))?;

    if let Some(Status { code, message }) = image.error {
        bail!("GoogleVision: Recognition failed with code {code}: {message}");
    }

    let Some(annotation) = image.full_text_annotation else {
        return Ok(CloudText::default());
    };

    let pages = annotation
        .pages
        .into_iter()
        .map(|page| Page {
            blocks: page
                .blocks
                .into_iter()
                .map(|block| CloudBlock {
                    bounding_box: rect(&block.bounding_box),
                    paragraphs: block
                        .paragraphs
                        .into_iter()
                        .map(|paragraph| Paragraph {
                            bounding_box: rect(&paragraph.bounding_box),
                            words: paragraph
                                .words
                                .into_iter()
                                .map(|word| Word {
                                    bounding_box: rect(&word.bounding_box),
                                    symbols: word
                                        .symbols
                                        .into_iter()
                                        .map(|symbol| Symbol {
                                            bounding_box: rect(&symbol.bounding_box),
                                            text: symbol.text,
                                        })
                                        .collect(),
                                })
                                .collect(),
                        })
                        .collect(),
                })
                .collect(),
        })
        .collect();

    Ok(CloudText { pages })
}
