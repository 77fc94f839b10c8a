use std::sync::LazyLock;

use eframe::egui::Rect;
use regex::Regex;

use crate::text::{CloudText, LocalText};

// `\w` restricted to ASCII, which is what social networks accept in usernames.
static HANDLE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^@(?-u:\w)+$").expect("handle pattern is a valid regex"));

/// Whether the whole of `text` looks like a social media handle, ie. `@` followed by word characters.
pub fn looks_like_handle(text: &str) -> bool {
    HANDLE_PATTERN.is_match(text)
}

/// A recognized token which looks like a handle.
#[derive(Debug, Clone, PartialEq)]
pub struct HandleMatch {
    pub text: String,
    /// Where to draw the handle. For handles joined from two cloud words, this is the box of the second word.
    pub bounding_box: Option<Rect>,
}

/// What a recognition result contained.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    /// The engine did not detect any text. This is not the same as finding text without handles.
    NoText,
    Found {
        handles: Vec<HandleMatch>,
        /// Boxes of every recognized leaf unit (elements or words), in reading order.
        boxes: Vec<Rect>,
    },
}

impl Extraction {
    pub fn handles(&self) -> &[HandleMatch] {
        match self {
            Self::NoText => &[],
            Self::Found { handles, .. } => handles,
        }
    }
}

/// Find handles among the elements of an on-device recognition result.
pub fn extract_local(text: &LocalText) -> Extraction {
    if text.is_empty() {
        return Extraction::NoText;
    }

    let handles = text
        .elements()
        .filter(|element| looks_like_handle(&element.text))
        .map(|element| HandleMatch {
            text: element.text.clone(),
            bounding_box: element.bounding_box,
        })
        .collect();

    let boxes = text
        .elements()
        .filter_map(|element| element.bounding_box)
        .collect();

    Extraction::Found { handles, boxes }
}

/// Find handles in a cloud recognition result.
///
/// Cloud OCR tends to split a handle into `@` and the name, so every pair of adjacent words in a
/// paragraph is joined and matched instead of single words. Only pairs are recovered: a handle
/// split over three words is lost.
pub fn extract_cloud(text: &CloudText) -> Extraction {
    if text.is_empty() {
        return Extraction::NoText;
    }

    let mut handles = Vec::new();
    let mut boxes = Vec::new();

    for paragraph in text.paragraphs() {
        let words: Vec<_> = paragraph
            .words
            .iter()
            .map(|word| (word.text(), word.bounding_box))
            .collect();

        for pair in words.windows(2) {
            let joined = format!("{}{}", pair[0].0, pair[1].0);
            if looks_like_handle(&joined) {
                handles.push(HandleMatch {
                    text: joined,
                    bounding_box: pair[1].1,
                });
            }
        }

        boxes.extend(words.iter().filter_map(|(_, rect)| *rect));
    }

    Extraction::Found { handles, boxes }
}
