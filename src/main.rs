use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use config::{AppConfig, Config};
use controller::{Controller, ControllerOptions};
use eframe::{egui, CreationContext};
use gui::{main_window::OverlayView, popups::Popups};
use overlay::Overlay;
use services::Services;

pub mod config;
pub mod controller;
pub mod gui;
pub mod handles;
pub mod overlay;
pub mod services;
pub mod text;

pub const WINDOW_TITLE: &str = "handlesnap";

/// How often to check on a running recognition.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

fn main() -> Result<()> {
    pretty_env_logger::init();

    let config = AppConfig::load().context("Could not load main configuration file")?;

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title(WINDOW_TITLE)
            .with_inner_size([config.window_width as f32, config.window_height as f32]),
        ..Default::default()
    };

    eframe::run_native(
        WINDOW_TITLE,
        options,
        Box::new(|cc| {
            EframeApp::new(cc, config)
                .map(|app| -> Box<dyn eframe::App> { Box::new(app) })
                .map_err(Into::into)
        }),
    )
    .map_err(|e| anyhow!("{e}"))
}

pub struct EframeApp {
    pub config: AppConfig,
    pub services: Services,
    pub controller: Controller,
    pub overlay: Overlay,
    pub popups: Popups,

    /// The picked image, as shown on screen.
    pub texture: Option<egui::TextureHandle>,
    /// Space available to show the image in, in physical pixels.
    pub surface: egui::Vec2,
    pub show_progress: bool,
    pub show_config: bool,
}

impl EframeApp {
    pub fn new(_cc: &CreationContext, config: AppConfig) -> Result<Self> {
        let services = Services::new(&config).context("Failed to initialise services")?;

        Ok(Self {
            controller: Controller::new(controller_options(&config)),
            overlay: Overlay::new(config.annotation_style()),
            config,
            services,
            popups: Popups::default(),
            texture: None,
            surface: egui::Vec2::ZERO,
            show_progress: false,
            show_config: false,
        })
    }

    /// Apply the current configuration to the controller and overlay, and recreate services.
    pub fn apply_config(&mut self) -> Result<()> {
        self.config
            .save()
            .context("Could not save main configuration file")?;

        // the new services load the configuration the old ones save here
        self.services
            .terminate()
            .context("Failed to save service configuration")?;
        self.services = Services::new(&self.config).context("Failed to reload services")?;

        self.controller.set_options(controller_options(&self.config));
        self.overlay.set_style(self.config.annotation_style());
        Ok(())
    }
}

fn controller_options(config: &AppConfig) -> ControllerOptions {
    ControllerOptions {
        cloud: config.cloud_options(),
        outline_all_text: config.outline_all_text,
    }
}

impl eframe::App for EframeApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let mut view = OverlayView {
            overlay: &mut self.overlay,
            popups: &mut self.popups,
            show_progress: &mut self.show_progress,
        };
        self.controller.poll(&mut view);

        if self.controller.is_busy() {
            ctx.request_repaint_after(POLL_INTERVAL);
        }
        if self.overlay.take_repaint_request() {
            ctx.request_repaint();
        }

        gui::main_window::show(self, ctx);

        if self.show_config {
            gui::config_window::show_config_window(self, ctx);
        }

        self.popups.show(ctx);
    }
}
