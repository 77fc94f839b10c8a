use eframe::egui;

use crate::{config::Config, EframeApp};

pub fn show_config_window(app: &mut EframeApp, ctx: &egui::Context) {
    let mut open = app.show_config;

    egui::Window::new(concat!(env!("CARGO_PKG_NAME"), " Configuration"))
        .open(&mut open)
        .default_size([420.0, 520.0])
        .show(ctx, |ui| {
            egui_extras::StripBuilder::new(ui)
                .size(egui_extras::Size::remainder())
                .size(egui_extras::Size::exact(0.0))
                .size(egui_extras::Size::exact(22.0))
                .vertical(|mut strip| {
                    strip.cell(|ui| {
                        egui::ScrollArea::vertical().show(ui, |ui| {
                            let header_size = 18.0;

                            app.config.show_ui(ui);

                            ui.separator();

                            egui::CollapsingHeader::new(
                                egui::RichText::new(format!(
                                    "Local OCR: {}",
                                    app.config.ocr_service.name()
                                ))
                                .size(header_size),
                            )
                            .default_open(true)
                            .show_unindented(ui, |ui| {
                                app.services.ocr.show_config_ui(ui);
                            });

                            ui.separator();

                            egui::CollapsingHeader::new(
                                egui::RichText::new(format!(
                                    "Cloud OCR: {}",
                                    app.config.cloud_service.name()
                                ))
                                .size(header_size),
                            )
                            .default_open(true)
                            .show_unindented(ui, |ui| {
                                app.services.cloud.show_config_ui(ui);
                            });
                        });
                    });

                    strip.empty();

                    strip.cell(|ui| {
                        ui.centered_and_justified(|ui| {
                            if ui.button("Save and Reload Services").clicked() {
                                if let Err(e) = app.apply_config() {
                                    log::error!("{e:?}");
                                    app.popups.error(&e);
                                }
                            }
                        });
                    });
                });
        });

    app.show_config = open;
}
