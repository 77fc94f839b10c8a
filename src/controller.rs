use anyhow::Result;
use eframe::egui::{Rect, Vec2};
use image::{imageops::FilterType, DynamicImage, RgbaImage};

use crate::{
    handles::{self, Extraction},
    services::{
        cloud::{CloudOcrServiceJob, CloudOptions},
        ocr::OcrServiceJob,
        Services,
    },
    text::{CloudText, LocalText},
};

/// Everything the controller needs from the screen.
pub trait ScreenView {
    fn show_handle(&mut self, text: &str, bounding_box: Option<Rect>);
    fn show_box(&mut self, bounding_box: Option<Rect>);
    fn show_no_text_message(&mut self);
    fn show_error(&mut self, error: &anyhow::Error);
    fn show_progress(&mut self);
    fn hide_progress(&mut self);
    fn clear_overlay(&mut self);
}

/// Which recognition the action button runs next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    NoImage,
    LocalReady,
    CloudReady,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    PickImage,
    RecognizeLocal,
    RecognizeCloud,
}

impl Action {
    pub fn label(&self) -> &'static str {
        match self {
            Self::PickImage => "Open image…",
            Self::RecognizeLocal => "Recognize on device",
            Self::RecognizeCloud => "Recognize in the cloud",
        }
    }
}

/// A finished recognition.
#[derive(Debug)]
pub enum Recognized {
    Local(LocalText),
    Cloud(CloudText),
}

enum PendingJob {
    Local(OcrServiceJob),
    Cloud(CloudOcrServiceJob),
}

impl PendingJob {
    fn try_wait(&mut self) -> Option<Result<Recognized>> {
        match self {
            Self::Local(job) => flatten(job.try_wait(), Recognized::Local),
            Self::Cloud(job) => flatten(job.try_wait(), Recognized::Cloud),
        }
    }

    #[cfg(test)]
    fn wait(self) -> Result<Recognized> {
        match self {
            Self::Local(job) => job.wait()?.map(Recognized::Local),
            Self::Cloud(job) => job.wait()?.map(Recognized::Cloud),
        }
    }
}

fn flatten<T>(
    polled: Result<Option<Result<T>>>,
    f: impl FnOnce(T) -> Recognized,
) -> Option<Result<Recognized>> {
    match polled {
        Ok(None) => None,
        Ok(Some(result)) => Some(result.map(f)),
        Err(e) => Some(Err(e)),
    }
}

struct PendingRecognition {
    generation: u64,
    job: PendingJob,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ControllerOptions {
    pub cloud: CloudOptions,
    pub outline_all_text: bool,
}

/// Drives one recognition cycle after the other: picked image, recognition, annotations.
///
/// Every recognition gets a new generation. Only the result of the latest generation is ever
/// shown, so a slow job finishing after the user moved on is dropped.
pub struct Controller {
    mode: Mode,
    image: Option<RgbaImage>,
    generation: u64,
    pending: Option<PendingRecognition>,
    options: ControllerOptions,
}

impl Controller {
    pub fn new(options: ControllerOptions) -> Self {
        Self {
            mode: Mode::NoImage,
            image: None,
            generation: 0,
            pending: None,
            options,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn image(&self) -> Option<&RgbaImage> {
        self.image.as_ref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_busy(&self) -> bool {
        self.pending.is_some()
    }

    pub fn set_options(&mut self, options: ControllerOptions) {
        self.options = options;
    }

    pub fn next_action(&self) -> Action {
        match self.mode {
            Mode::NoImage => Action::PickImage,
            Mode::LocalReady => Action::RecognizeLocal,
            Mode::CloudReady => Action::RecognizeCloud,
        }
    }

    /// Run whatever the action button currently does. Picking an image is up to the caller, so
    /// `Some(Action::PickImage)` is returned instead.
    pub fn trigger_action(
        &mut self,
        services: &mut Services,
        view: &mut impl ScreenView,
    ) -> Option<Action> {
        match self.next_action() {
            Action::PickImage => return Some(Action::PickImage),
            Action::RecognizeLocal => self.run_local(services, view),
            Action::RecognizeCloud => self.run_cloud(services, view),
        }
        None
    }

    /// Use a newly picked image, resized to fit `surface`, and recognize it locally.
    ///
    /// `None` means the user cancelled the picker, which changes nothing.
    pub fn pick_image(
        &mut self,
        image: Option<DynamicImage>,
        surface: Vec2,
        services: &mut Services,
        view: &mut impl ScreenView,
    ) {
        let Some(image) = image else {
            log::debug!("Image picking was cancelled");
            return;
        };

        let image = fit_to_surface(image, surface).to_rgba8();
        log::info!("Picked image, resized to {}x{}", image.width(), image.height());

        self.image = Some(image);
        self.mode = Mode::LocalReady;
        self.run_local(services, view);
    }

    pub fn run_local(&mut self, services: &mut Services, view: &mut impl ScreenView) {
        let Some(image) = self.image.clone() else {
            log::warn!("Ignoring local recognition request without an image");
            return;
        };

        let job = PendingJob::Local(services.ocr.recognize(image));
        self.start(job, view);
    }

    pub fn run_cloud(&mut self, services: &mut Services, view: &mut impl ScreenView) {
        if self.mode != Mode::CloudReady {
            log::warn!("Ignoring cloud recognition request in mode {:?}", self.mode);
            return;
        }
        let Some(image) = self.image.clone() else {
            log::warn!("Ignoring cloud recognition request without an image");
            return;
        };

        let job = PendingJob::Cloud(services.cloud.recognize(image, self.options.cloud));
        self.start(job, view);
    }

    fn start(&mut self, job: PendingJob, view: &mut impl ScreenView) {
        self.generation += 1;

        if let Some(previous) = self.pending.take() {
            log::debug!(
                "Recognition {} superseded by {}",
                previous.generation,
                self.generation
            );
        }

        view.clear_overlay();
        view.show_progress();

        self.pending = Some(PendingRecognition {
            generation: self.generation,
            job,
        });
    }

    /// Deliver the pending recognition to `view` if it has finished. Never blocks.
    pub fn poll(&mut self, view: &mut impl ScreenView) {
        let Some(pending) = &mut self.pending else {
            return;
        };
        let Some(outcome) = pending.job.try_wait() else {
            return;
        };

        let generation = pending.generation;
        self.pending = None;
        self.finish(generation, outcome, view);
    }

    /// Block until the pending recognition finishes and deliver it to `view`.
    #[cfg(test)]
    pub fn wait(&mut self, view: &mut impl ScreenView) -> Result<()> {
        let pending = self
            .pending
            .take()
            .ok_or_else(|| anyhow::anyhow!("no recognition is in progress"))?;

        let outcome = pending.job.wait();
        self.finish(pending.generation, outcome, view);
        Ok(())
    }

    /// Show the outcome of the recognition started as `generation`, unless it was superseded.
    pub fn finish(
        &mut self,
        generation: u64,
        outcome: Result<Recognized>,
        view: &mut impl ScreenView,
    ) {
        if generation != self.generation {
            log::debug!(
                "Dropping stale result of recognition {generation}, latest is {}",
                self.generation
            );
            return;
        }

        if self
            .pending
            .as_ref()
            .is_some_and(|pending| pending.generation == generation)
        {
            self.pending = None;
        }

        view.hide_progress();

        let extraction = match outcome {
            Err(e) => {
                log::error!("Recognition {generation} failed: {e:?}");
                if let Mode::LocalReady = self.mode {
                    self.mode = Mode::CloudReady;
                }
                view.show_error(&e);
                return;
            }
            Ok(Recognized::Local(text)) => {
                self.mode = Mode::CloudReady;
                handles::extract_local(&text)
            }
            Ok(Recognized::Cloud(text)) => handles::extract_cloud(&text),
        };

        match extraction {
            Extraction::NoText => {
                log::info!("Recognition {generation} found no text");
                view.show_no_text_message();
            }
            Extraction::Found { handles, boxes } => {
                log::info!(
                    "Recognition {generation} found {} handle(s) among {} box(es)",
                    handles.len(),
                    boxes.len()
                );

                if self.options.outline_all_text {
                    for rect in boxes {
                        view.show_box(Some(rect));
                    }
                }
                for handle in handles {
                    view.show_handle(&handle.text, handle.bounding_box);
                }
            }
        }
    }
}

/// Scale `image` so that it fits inside `surface` while keeping its aspect ratio.
///
/// Small images are scaled up. A surface without an area leaves the image untouched.
pub fn fit_to_surface(image: DynamicImage, surface: Vec2) -> DynamicImage {
    let (width, height) = (image.width() as f32, image.height() as f32);

    if surface.x <= 0.0 || surface.y <= 0.0 || width == 0.0 || height == 0.0 {
        return image;
    }

    let scale = f32::max(width / surface.x, height / surface.y);
    let new_width = ((width / scale) as u32).max(1);
    let new_height = ((height / scale) as u32).max(1);

    image.resize_exact(new_width, new_height, FilterType::Triangle)
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;
    use eframe::egui::{self, pos2, vec2};

    use super::*;
    use crate::{
        services::{cloud::CloudOcrService, ocr::OcrService, ServiceJob},
        text::{CloudBlock, Page, Paragraph, TextBlock, TextElement, TextLine, Word},
    };

    #[derive(Debug, PartialEq)]
    enum Event {
        Handle(String, Option<Rect>),
        Box(Option<Rect>),
        NoText,
        Error,
        Progress,
        HideProgress,
        Clear,
    }

    #[derive(Default)]
    struct RecordingView(Vec<Event>);

    impl RecordingView {
        /// Annotations that would be on screen right now.
        fn annotations(&self) -> Vec<&Event> {
            let start = self
                .0
                .iter()
                .rposition(|e| *e == Event::Clear)
                .map_or(0, |i| i + 1);
            self.0[start..]
                .iter()
                .filter(|e| matches!(e, Event::Handle(..) | Event::Box(_)))
                .collect()
        }
    }

    impl ScreenView for RecordingView {
        fn show_handle(&mut self, text: &str, bounding_box: Option<Rect>) {
            self.0.push(Event::Handle(text.to_owned(), bounding_box));
        }

        fn show_box(&mut self, bounding_box: Option<Rect>) {
            self.0.push(Event::Box(bounding_box));
        }

        fn show_no_text_message(&mut self) {
            self.0.push(Event::NoText);
        }

        fn show_error(&mut self, _error: &anyhow::Error) {
            self.0.push(Event::Error);
        }

        fn show_progress(&mut self) {
            self.0.push(Event::Progress);
        }

        fn hide_progress(&mut self) {
            self.0.push(Event::HideProgress);
        }

        fn clear_overlay(&mut self) {
            self.0.push(Event::Clear);
        }
    }

    /// `None` makes every recognition fail.
    struct FakeOcr(Option<LocalText>);

    impl OcrService for FakeOcr {
        fn name(&self) -> &'static str {
            "fake"
        }

        fn init(&mut self) -> Result<()> {
            Ok(())
        }

        fn terminate(&mut self) -> Result<()> {
            Ok(())
        }

        fn show_config_ui(&mut self, _ui: &mut egui::Ui) {}

        fn recognize(&mut self, _image: RgbaImage) -> OcrServiceJob {
            let text = self.0.clone();
            ServiceJob::new(move || text.ok_or_else(|| anyhow!("engine offline")))
        }
    }

    struct FakeCloud(Option<CloudText>);

    impl CloudOcrService for FakeCloud {
        fn name(&self) -> &'static str {
            "fake cloud"
        }

        fn init(&mut self) -> Result<()> {
            Ok(())
        }

        fn terminate(&mut self) -> Result<()> {
            Ok(())
        }

        fn show_config_ui(&mut self, _ui: &mut egui::Ui) {}

        fn recognize(&mut self, _image: RgbaImage, options: CloudOptions) -> CloudOcrServiceJob {
            assert_eq!(options.max_results, 15);
            let text = self.0.clone();
            ServiceJob::new(move || text.ok_or_else(|| anyhow!("network unreachable")))
        }
    }

    fn rect(x: f32) -> Rect {
        Rect::from_min_max(pos2(x, 0.0), pos2(x + 10.0, 10.0))
    }

    fn contact_text() -> LocalText {
        LocalText {
            blocks: vec![TextBlock {
                text: "Contact @raywenderlich today".to_owned(),
                bounding_box: None,
                lines: vec![TextLine {
                    text: "Contact @raywenderlich today".to_owned(),
                    bounding_box: None,
                    elements: vec![
                        TextElement::new("Contact", Some(rect(0.0))),
                        TextElement::new("@raywenderlich", Some(rect(50.0))),
                        TextElement::new("today", Some(rect(100.0))),
                    ],
                }],
            }],
        }
    }

    fn split_handle_text() -> CloudText {
        CloudText {
            pages: vec![Page {
                blocks: vec![CloudBlock {
                    bounding_box: None,
                    paragraphs: vec![Paragraph {
                        bounding_box: None,
                        words: vec![
                            Word::from_text("@", Some(rect(0.0))),
                            Word::from_text("jane", Some(rect(20.0))),
                            Word::from_text("doe", Some(rect(40.0))),
                        ],
                    }],
                }],
            }],
        }
    }

    fn services(local: Option<LocalText>, cloud: Option<CloudText>) -> Services {
        Services::from_services(Box::new(FakeOcr(local)), Box::new(FakeCloud(cloud))).unwrap()
    }

    fn image() -> Option<DynamicImage> {
        Some(DynamicImage::ImageRgba8(RgbaImage::new(400, 200)))
    }

    #[test]
    fn local_cycle_shows_handle_and_enables_cloud() {
        let mut services = services(Some(contact_text()), None);
        let mut view = RecordingView::default();
        let mut controller = Controller::new(Default::default());
        assert_eq!(controller.next_action(), Action::PickImage);

        controller.pick_image(image(), vec2(200.0, 200.0), &mut services, &mut view);
        assert_eq!(controller.mode(), Mode::LocalReady);
        assert!(controller.is_busy());

        controller.wait(&mut view).unwrap();

        assert_eq!(
            view.0,
            [
                Event::Clear,
                Event::Progress,
                Event::HideProgress,
                Event::Handle("@raywenderlich".to_owned(), Some(rect(50.0))),
            ]
        );
        assert_eq!(controller.mode(), Mode::CloudReady);
        assert_eq!(controller.next_action(), Action::RecognizeCloud);
        assert!(!controller.is_busy());
    }

    #[test]
    fn cloud_cycle_joins_split_handles() {
        let mut services = services(Some(LocalText::default()), Some(split_handle_text()));
        let mut view = RecordingView::default();
        let mut controller = Controller::new(Default::default());

        controller.pick_image(image(), vec2(200.0, 200.0), &mut services, &mut view);
        controller.wait(&mut view).unwrap();
        assert_eq!(view.0.last(), Some(&Event::NoText));

        assert_eq!(controller.trigger_action(&mut services, &mut view), None);
        controller.wait(&mut view).unwrap();

        assert_eq!(
            view.annotations(),
            [&Event::Handle("@jane".to_owned(), Some(rect(20.0)))]
        );
        assert_eq!(controller.mode(), Mode::CloudReady);
    }

    #[test]
    fn outline_all_text_shows_every_box() {
        let mut services = services(Some(contact_text()), None);
        let mut view = RecordingView::default();
        let mut controller = Controller::new(ControllerOptions {
            outline_all_text: true,
            ..Default::default()
        });

        controller.pick_image(image(), vec2(200.0, 200.0), &mut services, &mut view);
        controller.wait(&mut view).unwrap();

        assert_eq!(
            view.annotations(),
            [
                &Event::Box(Some(rect(0.0))),
                &Event::Box(Some(rect(50.0))),
                &Event::Box(Some(rect(100.0))),
                &Event::Handle("@raywenderlich".to_owned(), Some(rect(50.0))),
            ]
        );
    }

    #[test]
    fn failure_leaves_overlay_cleared() {
        let mut services = services(Some(contact_text()), None);
        let mut view = RecordingView::default();
        let mut controller = Controller::new(Default::default());

        controller.pick_image(image(), vec2(200.0, 200.0), &mut services, &mut view);
        controller.wait(&mut view).unwrap();
        assert_eq!(view.annotations().len(), 1);

        controller.run_cloud(&mut services, &mut view);
        controller.wait(&mut view).unwrap();

        assert!(view.annotations().is_empty());
        assert_eq!(view.0.last(), Some(&Event::Error));
        assert!(view.0.contains(&Event::HideProgress));
        assert_eq!(controller.mode(), Mode::CloudReady);
    }

    #[test]
    fn cancelled_pick_changes_nothing() {
        let mut services = services(Some(contact_text()), None);
        let mut view = RecordingView::default();
        let mut controller = Controller::new(Default::default());

        controller.pick_image(None, vec2(200.0, 200.0), &mut services, &mut view);

        assert!(view.0.is_empty());
        assert_eq!(controller.mode(), Mode::NoImage);
        assert_eq!(
            controller.trigger_action(&mut services, &mut view),
            Some(Action::PickImage)
        );
    }

    #[test]
    fn cloud_is_not_available_before_local_finishes() {
        let mut services = services(Some(contact_text()), Some(split_handle_text()));
        let mut view = RecordingView::default();
        let mut controller = Controller::new(Default::default());

        controller.pick_image(image(), vec2(200.0, 200.0), &mut services, &mut view);
        let generation = controller.generation();
        controller.run_cloud(&mut services, &mut view);
        assert_eq!(controller.generation(), generation);
    }

    #[test]
    fn stale_results_are_dropped() {
        let mut services = services(Some(contact_text()), Some(split_handle_text()));
        let mut view = RecordingView::default();
        let mut controller = Controller::new(Default::default());

        controller.pick_image(image(), vec2(200.0, 200.0), &mut services, &mut view);
        controller.wait(&mut view).unwrap();
        let stale = controller.generation();

        controller.run_cloud(&mut services, &mut view);
        controller.wait(&mut view).unwrap();
        let events = view.0.len();

        controller.finish(stale, Ok(Recognized::Local(contact_text())), &mut view);
        assert_eq!(view.0.len(), events);
        assert_eq!(
            view.annotations(),
            [&Event::Handle("@jane".to_owned(), Some(rect(20.0)))]
        );
    }

    #[test]
    fn repicking_supersedes_the_pending_recognition() {
        let mut services = services(Some(contact_text()), Some(split_handle_text()));
        let mut view = RecordingView::default();
        let mut controller = Controller::new(Default::default());

        controller.pick_image(image(), vec2(200.0, 200.0), &mut services, &mut view);
        controller.wait(&mut view).unwrap();
        controller.run_cloud(&mut services, &mut view);

        controller.pick_image(image(), vec2(100.0, 100.0), &mut services, &mut view);
        assert_eq!(controller.mode(), Mode::LocalReady);
        controller.wait(&mut view).unwrap();

        assert_eq!(
            view.annotations(),
            [&Event::Handle("@raywenderlich".to_owned(), Some(rect(50.0)))]
        );
        assert!(controller.wait(&mut view).is_err());
    }

    #[test]
    fn poll_delivers_finished_jobs() {
        let mut services = services(Some(contact_text()), None);
        let mut view = RecordingView::default();
        let mut controller = Controller::new(Default::default());

        controller.pick_image(image(), vec2(200.0, 200.0), &mut services, &mut view);
        while controller.is_busy() {
            controller.poll(&mut view);
            std::thread::sleep(std::time::Duration::from_millis(1));
        }

        assert_eq!(view.annotations().len(), 1);
    }

    #[test]
    fn images_are_fitted_to_the_surface() {
        let image = DynamicImage::ImageRgba8(RgbaImage::new(400, 200));

        let fitted = fit_to_surface(image.clone(), vec2(200.0, 200.0));
        assert_eq!((fitted.width(), fitted.height()), (200, 100));

        let fitted = fit_to_surface(image.clone(), vec2(800.0, 800.0));
        assert_eq!((fitted.width(), fitted.height()), (800, 400));

        let fitted = fit_to_surface(image, vec2(0.0, 100.0));
        assert_eq!((fitted.width(), fitted.height()), (400, 200));
    }
}
