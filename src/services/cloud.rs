use anyhow::Result;
use eframe::egui;
use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::text::CloudText;

use super::ServiceJob;

pub mod google_vision;

pub type CloudOcrServiceJob = ServiceJob<Result<CloudText>>;

/// A cloud document text recognition service.
pub trait CloudOcrService {
    /// Name shown to the user.
    fn name(&self) -> &'static str;

    /// Initialise the service (ie. load its configuration file, etc).
    fn init(&mut self) -> Result<()>;
    /// Terminate the service (ie. save its configuration file, etc).
    fn terminate(&mut self) -> Result<()>;

    /// Show the config UI for the service's configuration.
    fn show_config_ui(&mut self, ui: &mut egui::Ui);

    /// Recognize the text inside an image, down to single symbols.
    fn recognize(&mut self, image: RgbaImage, options: CloudOptions) -> CloudOcrServiceJob;
}

/// Per request options for cloud recognition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CloudOptions {
    pub max_results: u32,
    pub model: CloudModel,
}

impl Default for CloudOptions {
    fn default() -> Self {
        Self {
            max_results: 15,
            model: CloudModel::Latest,
        }
    }
}

/// Which generation of the cloud model to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloudModel {
    Latest,
    Stable,
}
