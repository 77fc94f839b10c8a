use eframe::egui::{Pos2, Rect};

/// Text recognized by an on-device engine: blocks made of lines made of elements.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocalText {
    pub blocks: Vec<TextBlock>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextBlock {
    pub text: String,
    pub bounding_box: Option<Rect>,
    pub lines: Vec<TextLine>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextLine {
    pub text: String,
    pub bounding_box: Option<Rect>,
    pub elements: Vec<TextElement>,
}

/// Roughly a word. The smallest unit a local engine reports.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextElement {
    pub text: String,
    pub bounding_box: Option<Rect>,
}

impl TextElement {
    pub fn new(text: impl Into<String>, bounding_box: Option<Rect>) -> Self {
        Self {
            text: text.into(),
            bounding_box,
        }
    }
}

impl LocalText {
    /// Whether the engine found no text at all.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Iterate over every element of every line of every block, in reading order.
    pub fn elements(&self) -> impl Iterator<Item = &TextElement> {
        self.blocks
            .iter()
            .flat_map(|block| &block.lines)
            .flat_map(|line| &line.elements)
    }

    /// Build a tree without any bounding boxes from an engine that only returns plain text.
    ///
    /// Paragraphs are separated by ideographic spaces (`U+3000`) or blank lines. Each non-empty
    /// line becomes a [`TextLine`] and each whitespace separated token a [`TextElement`].
    pub fn from_plain_text(text: &str) -> Self {
        let mut blocks = Vec::new();

        for chunk in text.split('\u{3000}') {
            let mut lines: Vec<TextLine> = Vec::new();

            for line in chunk.lines().map(str::trim) {
                if line.is_empty() {
                    if !lines.is_empty() {
                        blocks.push(TextBlock::from_lines(std::mem::take(&mut lines)));
                    }
                    continue;
                }

                lines.push(TextLine {
                    text: line.to_owned(),
                    bounding_box: None,
                    elements: line
                        .split_whitespace()
                        .map(|token| TextElement::new(token, None))
                        .collect(),
                });
            }

            if !lines.is_empty() {
                blocks.push(TextBlock::from_lines(lines));
            }
        }

        Self { blocks }
    }
}

impl TextBlock {
    fn from_lines(lines: Vec<TextLine>) -> Self {
        let text = lines
            .iter()
            .map(|line| line.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        Self {
            text,
            bounding_box: None,
            lines,
        }
    }
}

/// Text recognized by a cloud document engine: pages, blocks, paragraphs, words and symbols.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CloudText {
    pub pages: Vec<Page>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub blocks: Vec<CloudBlock>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CloudBlock {
    pub bounding_box: Option<Rect>,
    pub paragraphs: Vec<Paragraph>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Paragraph {
    pub bounding_box: Option<Rect>,
    pub words: Vec<Word>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Word {
    pub bounding_box: Option<Rect>,
    pub symbols: Vec<Symbol>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Symbol {
    pub text: String,
    pub bounding_box: Option<Rect>,
}

impl CloudText {
    /// Whether no page carries any block. A response without any annotation is empty too.
    pub fn is_empty(&self) -> bool {
        self.pages.iter().all(|page| page.blocks.is_empty())
    }

    pub fn paragraphs(&self) -> impl Iterator<Item = &Paragraph> {
        self.pages
            .iter()
            .flat_map(|page| &page.blocks)
            .flat_map(|block| &block.paragraphs)
    }
}

impl Word {
    /// A word made of one symbol per character of `text`, all sharing the word's box.
    pub fn from_text(text: &str, bounding_box: Option<Rect>) -> Self {
        Self {
            bounding_box,
            symbols: text
                .chars()
                .map(|c| Symbol {
                    text: c.to_string(),
                    bounding_box,
                })
                .collect(),
        }
    }

    /// The word's text, which is its symbols joined without a separator.
    pub fn text(&self) -> String {
        self.symbols.iter().map(|symbol| symbol.text.as_str()).collect()
    }
}

/// Axis aligned bounding rectangle of a polygon.
pub fn rect_from_vertices(vertices: &[(f32, f32)]) -> Option<Rect> {
    let (&(x, y), rest) = vertices.split_first()?;

    Some(rest.iter().fold(
        Rect::from_min_max(Pos2::new(x, y), Pos2::new(x, y)),
        |rect, &(x, y)| rect.union(Rect::from_min_max(Pos2::new(x, y), Pos2::new(x, y))),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_splits_into_blocks_lines_and_elements() {
        let text = LocalText::from_plain_text("Contact @raywenderlich today\nor not\n\nsecond block");

        assert_eq!(text.blocks.len(), 2);
        assert_eq!(text.blocks[0].lines.len(), 2);
        assert_eq!(text.blocks[0].text, "Contact @raywenderlich today\nor not");
        assert_eq!(text.blocks[1].lines[0].elements[0].text, "second");

        let elements: Vec<_> = text.elements().map(|e| e.text.as_str()).collect();
        assert_eq!(
            elements,
            ["Contact", "@raywenderlich", "today", "or", "not", "second", "block"]
        );
        assert!(text.elements().all(|e| e.bounding_box.is_none()));
    }

    #[test]
    fn plain_text_splits_on_ideographic_space() {
        let text = LocalText::from_plain_text("first\u{3000}second");
        assert_eq!(text.blocks.len(), 2);
    }

    #[test]
    fn blank_plain_text_is_empty() {
        assert!(LocalText::from_plain_text("").is_empty());
        assert!(LocalText::from_plain_text(" \n \u{3000}\n").is_empty());
    }

    #[test]
    fn word_text_joins_symbols() {
        let word = Word {
            bounding_box: None,
            symbols: vec![
                Symbol {
                    text: "@".to_owned(),
                    bounding_box: None,
                },
                Symbol {
                    text: "jane".to_owned(),
                    bounding_box: None,
                },
            ],
        };
        assert_eq!(word.text(), "@jane");
        assert_eq!(Word::from_text("doe", None).symbols.len(), 3);
    }

    #[test]
    fn cloud_text_without_blocks_is_empty() {
        assert!(CloudText::default().is_empty());
        assert!(CloudText {
            pages: vec![Page::default(), Page::default()]
        }
        .is_empty());
        assert!(!CloudText {
            pages: vec![Page {
                blocks: vec![CloudBlock::default()]
            }]
        }
        .is_empty());
    }

    #[test]
    fn rect_covers_all_vertices() {
        let rect = rect_from_vertices(&[(10.0, 20.0), (50.0, 22.0), (48.0, 60.0), (8.0, 58.0)])
            .unwrap();
        assert_eq!(rect.min, Pos2::new(8.0, 20.0));
        assert_eq!(rect.max, Pos2::new(50.0, 60.0));
        assert_eq!(rect_from_vertices(&[]), None);
    }
}
