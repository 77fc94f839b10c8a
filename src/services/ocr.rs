use anyhow::Result;
use eframe::egui;
use image::RgbaImage;

use crate::text::LocalText;

use super::ServiceJob;

pub mod owocr;
pub mod tesseract;

pub type OcrServiceJob = ServiceJob<Result<LocalText>>;

/// An on-device (or at least local network) text recognition service.
pub trait OcrService {
    /// Name shown to the user.
    fn name(&self) -> &'static str;

    /// Initialise the service (ie. load its configuration file, etc).
    fn init(&mut self) -> Result<()>;
    /// Terminate the service (ie. save its configuration file, etc).
    fn terminate(&mut self) -> Result<()>;

    /// Show the config UI for the service's configuration.
    fn show_config_ui(&mut self, ui: &mut egui::Ui);

    /// Recognize the text inside an image.
    fn recognize(&mut self, image: RgbaImage) -> OcrServiceJob;
}
