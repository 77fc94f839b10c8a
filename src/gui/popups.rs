use std::time::{Duration, Instant};

use eframe::egui::{self, vec2, Color32};

/// How long a notice stays on screen.
const NOTICE_DURATION: Duration = Duration::from_secs(4);

/// Popups which should be shown to the user: error messages in their own window, and short
/// notices on top of the main window.
#[derive(Debug, Default)]
pub struct Popups {
    errors: Vec<Popup>,
    next_id: u64,
    notice: Option<(String, Instant)>,
}

#[derive(Debug)]
struct Popup {
    /// Identifies the popup's viewport for as long as it is open.
    id: u64,
    message: String,
    first_frame: bool,
}

impl Popups {
    /// Show a new error message to the user.
    pub fn error(&mut self, e: &anyhow::Error) {
        self.errors.push(Popup {
            id: self.next_id,
            message: format_error(e),
            first_frame: true,
        });
        self.next_id += 1;
    }

    /// Show a short lived message, replacing the current one.
    pub fn notice(&mut self, message: impl Into<String>) {
        self.notice = Some((message.into(), Instant::now()));
    }

    pub fn current_notice(&self) -> Option<&str> {
        self.notice
            .as_ref()
            .filter(|(_, shown_at)| shown_at.elapsed() < NOTICE_DURATION)
            .map(|(message, _)| message.as_str())
    }

    /// Show all currently held popups.
    pub fn show(&mut self, ctx: &egui::Context) {
        self.show_notice(ctx);

        let mut close_popup = None;

        for (idx, popup) in self.errors.iter_mut().enumerate() {
            ctx.show_viewport_immediate(
                popup.viewport_id(),
                egui::ViewportBuilder {
                    title: Some("Error".to_owned()),
                    inner_size: Some(vec2(640.0, 480.0)),
                    ..Default::default()
                },
                |ctx, _| {
                    if popup.first_frame {
                        ctx.send_viewport_cmd(egui::ViewportCommand::Focus);
                        popup.first_frame = false
                    }

                    egui::CentralPanel::default().show(ctx, |ui| {
                        egui_extras::StripBuilder::new(ui)
                            .size(egui_extras::Size::remainder())
                            .size(egui_extras::Size::exact(22.0))
                            .vertical(|mut strip| {
                                strip.cell(|ui| {
                                    egui::ScrollArea::vertical().auto_shrink(false).show(
                                        ui,
                                        |ui| {
                                            ui.label(&popup.message);
                                        },
                                    );
                                });

                                strip.cell(|ui| {
                                    ui.centered_and_justified(|ui| {
                                        if ui.button("Close").clicked() {
                                            close_popup = Some(idx);
                                        }
                                    });
                                });
                            });
                    });

                    if ctx.input(|input| input.viewport().close_requested()) {
                        close_popup = Some(idx);
                    }
                },
            );
        }

        if let Some(idx) = close_popup {
            self.close(idx);
        }
    }

    fn close(&mut self, idx: usize) {
        self.errors.remove(idx);
    }

    fn show_notice(&mut self, ctx: &egui::Context) {
        let Some((_, shown_at)) = &self.notice else {
            return;
        };

        let remaining = NOTICE_DURATION.saturating_sub(shown_at.elapsed());
        if remaining.is_zero() {
            self.notice = None;
            ctx.request_repaint();
            return;
        }
        // come back to hide it
        ctx.request_repaint_after(remaining);

        let Some(message) = self.current_notice() else {
            return;
        };

        egui::Area::new(egui::Id::new("notice"))
            .anchor(egui::Align2::CENTER_BOTTOM, vec2(0.0, -48.0))
            .interactable(false)
            .show(ctx, |ui| {
                egui::Frame::popup(ui.style())
                    .fill(Color32::from_black_alpha(200))
                    .show(ui, |ui| {
                        ui.label(
                            egui::RichText::new(message)
                                .size(18.0)
                                .color(Color32::WHITE),
                        );
                    });
            });
    }
}

impl Popup {
    fn viewport_id(&self) -> egui::ViewportId {
        egui::ViewportId(egui::Id::new(("error popup", self.id)))
    }
}

/// The error and its causes, one per line.
fn format_error(e: &anyhow::Error) -> String {
    let mut s = format!("Error: {e}\n");

    for (idx, error) in e.chain().enumerate().skip(1) {
        s.push_str(&format!("\t{}. {}\n", idx, error));
    }

    s
}
