use std::path::Path;

use anyhow::{Context, Result};
use eframe::egui::{self, Color32, Pos2, Rect};
use image::{DynamicImage, RgbaImage};

use crate::{
    controller::{Action, ScreenView},
    gui::popups::Popups,
    overlay::{ImageCanvas, Overlay},
    EframeApp,
};

const NO_TEXT_MESSAGE: &str = "No text detected";
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "webp"];

/// The main window as seen by the controller.
pub struct OverlayView<'a> {
    pub overlay: &'a mut Overlay,
    pub popups: &'a mut Popups,
    pub show_progress: &'a mut bool,
}

impl ScreenView for OverlayView<'_> {
    fn show_handle(&mut self, text: &str, bounding_box: Option<Rect>) {
        self.overlay.add_text(text, bounding_box);
    }

    fn show_box(&mut self, bounding_box: Option<Rect>) {
        self.overlay.add_box(bounding_box);
    }

    fn show_no_text_message(&mut self) {
        self.popups.notice(NO_TEXT_MESSAGE);
    }

    fn show_error(&mut self, error: &anyhow::Error) {
        self.popups.error(error);
    }

    fn show_progress(&mut self) {
        *self.show_progress = true;
    }

    fn hide_progress(&mut self) {
        *self.show_progress = false;
    }

    fn clear_overlay(&mut self) {
        self.overlay.clear();
    }
}

pub fn show(app: &mut EframeApp, ctx: &egui::Context) {
    egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
        ui.horizontal(|ui| {
            if ui.button(Action::PickImage.label()).clicked() {
                pick_image(app, ctx);
            }

            let action = app.controller.next_action();
            if action != Action::PickImage
                && ui
                    .add_enabled(!app.show_progress, egui::Button::new(action.label()))
                    .clicked()
            {
                let mut view = OverlayView {
                    overlay: &mut app.overlay,
                    popups: &mut app.popups,
                    show_progress: &mut app.show_progress,
                };
                app.controller.trigger_action(&mut app.services, &mut view);
            }

            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                ui.toggle_value(&mut app.show_config, "Settings");
                if !app.overlay.is_empty() {
                    ui.label(annotation_count(app.overlay.len()));
                }
            });
        });
    });

    egui::CentralPanel::default().show(ctx, |ui| {
        app.surface = surface_in_pixels(ui.available_size(), ctx.pixels_per_point());

        let Some(texture) = &app.texture else {
            ui.centered_and_justified(|ui| {
                ui.label(
                    egui::RichText::new("Open an image to look for @handles")
                        .size(24.0)
                        .color(Color32::from_white_alpha(128)),
                );
            });
            return;
        };

        let image_size = texture.size_vec2();
        let image_rect = fit_rect(image_size, ui.max_rect());

        let painter = ui.painter_at(ui.max_rect());
        painter.image(
            texture.id(),
            image_rect,
            Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0)),
            Color32::WHITE,
        );
        app.overlay
            .paint(&ImageCanvas::new(&painter, image_size, image_rect));

        if app.show_progress {
            ui.centered_and_justified(|ui| {
                ui.add(
                    egui::Spinner::new()
                        .color(Color32::from_white_alpha(96))
                        .size(48.0),
                );
            });
        }
    });
}

fn pick_image(app: &mut EframeApp, ctx: &egui::Context) {
    let image = match rfd::FileDialog::new()
        .add_filter("Images", IMAGE_EXTENSIONS)
        .pick_file()
    {
        None => None,
        Some(path) => match load_image(&path) {
            Ok(image) => Some(image),
            Err(e) => {
                log::error!("{e:?}");
                app.popups.error(&e);
                return;
            }
        },
    };

    let mut view = OverlayView {
        overlay: &mut app.overlay,
        popups: &mut app.popups,
        show_progress: &mut app.show_progress,
    };
    app.controller
        .pick_image(image, app.surface, &mut app.services, &mut view);

    if let Some(image) = app.controller.image() {
        app.texture = Some(load_texture(ctx, image));
    }
}

fn load_image(path: &Path) -> Result<DynamicImage> {
    image::open(path).with_context(|| format!("Could not open image `{}`", path.display()))
}

fn load_texture(ctx: &egui::Context, image: &RgbaImage) -> egui::TextureHandle {
    let color_image = egui::ColorImage::from_rgba_unmultiplied(
        [image.width() as usize, image.height() as usize],
        image.as_flat_samples().as_slice(),
    );

    ctx.load_texture(
        "picked image",
        color_image,
        egui::TextureOptions {
            magnification: egui::TextureFilter::Linear,
            minification: egui::TextureFilter::Linear,
            wrap_mode: egui::TextureWrapMode::ClampToEdge,
            mipmap_mode: None,
        },
    )
}

/// Images are resized in pixels while egui lays out in points.
fn surface_in_pixels(available: egui::Vec2, pixels_per_point: f32) -> egui::Vec2 {
    available * pixels_per_point
}

fn annotation_count(count: usize) -> String {
    match count {
        1 => "1 annotation".to_owned(),
        n => format!("{n} annotations"),
    }
}

/// The largest rect with the aspect ratio of `size` that fits centered inside `available`.
fn fit_rect(size: egui::Vec2, available: Rect) -> Rect {
    if size.x <= 0.0 || size.y <= 0.0 {
        return Rect::from_center_size(available.center(), egui::Vec2::ZERO);
    }

    let scale = f32::min(available.width() / size.x, available.height() / size.y);
    Rect::from_center_size(available.center(), size * scale)
}
