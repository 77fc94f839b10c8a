use eframe::egui::{self, pos2, Color32, Pos2, Rect, Stroke};

/// How annotations are drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnnotationStyle {
    pub colour: [u8; 3],
    pub text_size: f32,
    pub stroke_width: f32,
}

impl Default for AnnotationStyle {
    fn default() -> Self {
        Self {
            colour: [0, 0, 255],
            text_size: 54.0,
            stroke_width: 4.0,
        }
    }
}

impl AnnotationStyle {
    pub fn color32(&self) -> Color32 {
        let [r, g, b] = self.colour;
        Color32::from_rgb(r, g, b)
    }
}

/// A drawing surface. All coordinates are in image pixels.
pub trait Canvas {
    fn stroke_rect(&self, rect: Rect, colour: Color32, width: f32);
    /// Draw `text` with its baseline starting at `baseline_left`.
    fn text(&self, baseline_left: Pos2, text: &str, colour: Color32, size: f32);
}

/// A label and/or a box drawn on top of the image.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub text: Option<String>,
    pub rect: Option<Rect>,
    pub style: AnnotationStyle,
}

impl Annotation {
    /// Paint the annotation. Text without a box is drawn on the `fallback_line`-th line of the
    /// top left corner.
    pub fn paint(&self, canvas: &dyn Canvas, fallback_line: usize) {
        let colour = self.style.color32();

        match (&self.text, self.rect) {
            (text, Some(rect)) => {
                canvas.stroke_rect(rect, colour, self.style.stroke_width);
                if let Some(text) = text {
                    // text sits on the bottom edge of the box
                    canvas.text(rect.left_bottom(), text, colour, self.style.text_size);
                }
            }
            (Some(text), None) => {
                let baseline = pos2(0.0, (fallback_line + 1) as f32 * self.style.text_size);
                canvas.text(baseline, text, colour, self.style.text_size);
            }
            (None, None) => {}
        }
    }
}

/// The annotations of the current recognition cycle.
#[derive(Debug, Default)]
pub struct Overlay {
    annotations: Vec<Annotation>,
    style: AnnotationStyle,
    repaint_requested: bool,
}

impl Overlay {
    pub fn new(style: AnnotationStyle) -> Self {
        Self {
            annotations: Vec::new(),
            style,
            repaint_requested: false,
        }
    }

    /// Style used for annotations added from now on.
    pub fn set_style(&mut self, style: AnnotationStyle) {
        self.style = style;
    }

    /// Add a box. A missing box has nothing to draw and is dropped.
    pub fn add_box(&mut self, rect: Option<Rect>) {
        let Some(rect) = rect else {
            log::debug!("Ignoring box annotation without a rectangle");
            return;
        };

        self.push(Annotation {
            text: None,
            rect: Some(rect),
            style: self.style,
        });
    }

    /// Add a label, boxed when `rect` is known.
    pub fn add_text(&mut self, text: impl Into<String>, rect: Option<Rect>) {
        self.push(Annotation {
            text: Some(text.into()),
            rect,
            style: self.style,
        });
    }

    pub fn clear(&mut self) {
        self.annotations.clear();
        self.repaint_requested = true;
    }

    fn push(&mut self, annotation: Annotation) {
        self.annotations.push(annotation);
        self.repaint_requested = true;
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    /// Whether the overlay changed since the last call.
    pub fn take_repaint_request(&mut self) -> bool {
        std::mem::take(&mut self.repaint_requested)
    }

    /// Paint every annotation in insertion order.
    pub fn paint(&self, canvas: &dyn Canvas) {
        let mut fallback_line = 0;

        for annotation in &self.annotations {
            annotation.paint(canvas, fallback_line);
            if annotation.rect.is_none() && annotation.text.is_some() {
                fallback_line += 1;
            }
        }
    }
}

/// Maps image pixels onto the rectangle the image is shown in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenMapping {
    origin: Pos2,
    scale: f32,
}

impl ScreenMapping {
    /// `image_size` is the size of the image in pixels, `screen_rect` where it is shown on screen.
    pub fn new(image_size: egui::Vec2, screen_rect: Rect) -> Self {
        let scale = if image_size.x > 0.0 {
            screen_rect.width() / image_size.x
        } else {
            1.0
        };

        Self {
            origin: screen_rect.min,
            scale,
        }
    }

    pub fn to_screen(&self, pos: Pos2) -> Pos2 {
        self.origin + pos.to_vec2() * self.scale
    }

    pub fn rect_to_screen(&self, rect: Rect) -> Rect {
        Rect::from_min_max(self.to_screen(rect.min), self.to_screen(rect.max))
    }

    /// Scale a length, like a stroke width or a font size.
    pub fn length(&self, length: f32) -> f32 {
        length * self.scale
    }
}

/// A [`Canvas`] drawing on an egui painter in image coordinates.
pub struct ImageCanvas<'a> {
    painter: &'a egui::Painter,
    mapping: ScreenMapping,
}

impl<'a> ImageCanvas<'a> {
    pub fn new(painter: &'a egui::Painter, image_size: egui::Vec2, screen_rect: Rect) -> Self {
        Self {
            painter,
            mapping: ScreenMapping::new(image_size, screen_rect),
        }
    }
}

impl Canvas for ImageCanvas<'_> {
    fn stroke_rect(&self, rect: Rect, colour: Color32, width: f32) {
        self.painter.rect_stroke(
            self.mapping.rect_to_screen(rect),
            egui::CornerRadius::ZERO,
            Stroke::new(self.mapping.length(width), colour),
            egui::StrokeKind::Middle,
        );
    }

    fn text(&self, baseline_left: Pos2, text: &str, colour: Color32, size: f32) {
        self.painter.text(
            self.mapping.to_screen(baseline_left),
            egui::Align2::LEFT_BOTTOM,
            text,
            egui::FontId::proportional(self.mapping.length(size).max(1.0)),
            colour,
        );
    }
}
