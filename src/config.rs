use std::{fs::File, path::PathBuf};

use anyhow::{anyhow, Context, Result};
use eframe::egui;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::{
    overlay::AnnotationStyle,
    services::{
        cloud::{google_vision::GoogleVision, CloudModel, CloudOcrService, CloudOptions},
        ocr::{owocr::Owocr, tesseract::Tesseract, OcrService},
    },
};

pub trait Config: Serialize + DeserializeOwned + Default {
    /// Path of the configuration file, relative to the application's configuration directory.
    fn path() -> &'static str;
    fn show_ui(&mut self, ui: &mut egui::Ui);

    /// Loads a configuration file, or creates a default configuration struct if the file does not exist.
    fn load() -> Result<Self> {
        let config_path = config_path(Self::path())?;

        if !config_path.exists() {
            log::info!(
                "No configuration file at `{}`, using defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let file = File::open(&config_path).with_context(|| {
            format!(
                "Could not open configuration file: `{}`",
                config_path.display()
            )
        })?;

        let config = serde_json::from_reader(file).with_context(|| {
            format!(
                "Could not read configuration file: `{}`",
                config_path.display(),
            )
        })?;

        Ok(config)
    }

    fn save(&self) -> Result<()> {
        let config_path = config_path(Self::path())?;

        if let Some(config_dir) = config_path.parent() {
            std::fs::create_dir_all(config_dir).with_context(|| {
                format!(
                    "Could not create configuration directory: `{}`",
                    config_dir.display()
                )
            })?;
        }

        let file = File::create(&config_path).with_context(|| {
            format!(
                "Could not write to configuration file: `{}`",
                config_path.display()
            )
        })?;

        serde_json::to_writer_pretty(file, self).with_context(|| {
            format!(
                "Could not serialise configuration file: `{}`",
                config_path.display()
            )
        })?;

        Ok(())
    }
}

fn config_path(relative: &str) -> Result<PathBuf> {
    let mut config_path =
        dirs::config_dir().ok_or_else(|| anyhow!("Could not find suitable config directory"))?;
    config_path.push(env!("CARGO_PKG_NAME"));
    config_path.push(relative);
    Ok(config_path)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub ocr_service: OcrServiceList,
    pub cloud_service: CloudOcrServiceList,

    pub cloud_max_results: u32,
    pub cloud_model: CloudModel,

    /// Also draw a box around every piece of recognized text, not only handles.
    pub outline_all_text: bool,

    pub annotation_colour: [u8; 3],
    pub text_size: f32,
    pub stroke_width: f32,

    pub window_width: u32,
    pub window_height: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        let style = AnnotationStyle::default();
        let cloud = CloudOptions::default();

        Self {
            ocr_service: OcrServiceList::Tesseract,
            cloud_service: CloudOcrServiceList::GoogleVision,
            cloud_max_results: cloud.max_results,
            cloud_model: cloud.model,
            outline_all_text: false,
            annotation_colour: style.colour,
            text_size: style.text_size,
            stroke_width: style.stroke_width,
            window_width: 1280,
            window_height: 800,
        }
    }
}

impl AppConfig {
    pub fn annotation_style(&self) -> AnnotationStyle {
        AnnotationStyle {
            colour: self.annotation_colour,
            text_size: self.text_size,
            stroke_width: self.stroke_width,
        }
    }

    pub fn cloud_options(&self) -> CloudOptions {
        CloudOptions {
            max_results: self.cloud_max_results,
            model: self.cloud_model,
        }
    }
}

impl Config for AppConfig {
    fn path() -> &'static str {
        "config.json"
    }

    fn show_ui(&mut self, ui: &mut egui::Ui) {
        egui::ComboBox::from_label("Local OCR Service")
            .selected_text(self.ocr_service.name())
            .show_ui(ui, |ui| {
                ui.selectable_value(
                    &mut self.ocr_service,
                    OcrServiceList::Tesseract,
                    "Tesseract",
                );
                ui.selectable_value(&mut self.ocr_service, OcrServiceList::Owocr, "owocr");
            });
        egui::ComboBox::from_label("Cloud OCR Service")
            .selected_text(self.cloud_service.name())
            .show_ui(ui, |ui| {
                ui.selectable_value(
                    &mut self.cloud_service,
                    CloudOcrServiceList::GoogleVision,
                    "Google Cloud Vision",
                );
            });

        ui.horizontal(|ui| {
            ui.label("Cloud max results:");
            ui.add(egui::DragValue::new(&mut self.cloud_max_results).range(1..=100));
        });
        egui::ComboBox::from_label("Cloud model")
            .selected_text(format!("{:?}", self.cloud_model))
            .show_ui(ui, |ui| {
                ui.selectable_value(&mut self.cloud_model, CloudModel::Latest, "Latest");
                ui.selectable_value(&mut self.cloud_model, CloudModel::Stable, "Stable");
            });

        ui.checkbox(&mut self.outline_all_text, "Outline all recognized text");

        ui.horizontal(|ui| {
            egui::color_picker::color_edit_button_srgb(ui, &mut self.annotation_colour);
            ui.label("Annotation colour");
        });
        ui.add(egui::Slider::new(&mut self.text_size, 8.0..=128.0).text("Text size"));
        ui.add(egui::Slider::new(&mut self.stroke_width, 1.0..=16.0).text("Stroke width"));
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub enum OcrServiceList {
    Tesseract,
    /// Plain text only, handles are labelled without a box.
    Owocr,
}

impl OcrServiceList {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Tesseract => "Tesseract",
            Self::Owocr => "owocr",
        }
    }

    pub fn create_service(&self) -> Box<dyn OcrService> {
        match self {
            Self::Tesseract => Box::new(Tesseract::default()),
            Self::Owocr => Box::new(Owocr::default()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub enum CloudOcrServiceList {
    GoogleVision,
}

impl CloudOcrServiceList {
    pub fn name(&self) -> &'static str {
        match self {
            Self::GoogleVision => "Google Cloud Vision",
        }
    }

    pub fn create_service(&self) -> Box<dyn CloudOcrService> {
        match self {
            Self::GoogleVision => Box::new(GoogleVision::default()),
        }
    }
}
