use std::{
    io::{Cursor, Write},
    process::{Command, Stdio},
};

use anyhow::{anyhow, bail, Context, Result};
use eframe::egui::{self, pos2, vec2, Rect};
use image::{ImageFormat, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::{
    config::Config,
    services::ServiceJob,
    text::{LocalText, TextBlock, TextElement, TextLine},
};

use super::{OcrService, OcrServiceJob};

/// Recognition through the `tesseract` command line tool, which reports a box for every word.
#[derive(Default)]
pub struct Tesseract {
    config: TesseractConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TesseractConfig {
    command: String,
    language: String,
    page_seg_mode: u8,
}

impl Default for TesseractConfig {
    fn default() -> Self {
        Self {
            command: "tesseract".to_owned(),
            language: "eng".to_owned(),
            // fully automatic page segmentation
            page_seg_mode: 3,
        }
    }
}

impl TesseractConfig {
    /// Arguments reading a PNG from stdin and writing TSV to stdout.
    fn args(&self) -> Vec<String> {
        vec![
            "stdin".to_owned(),
            "stdout".to_owned(),
            "-l".to_owned(),
            self.language.clone(),
            "--psm".to_owned(),
            self.page_seg_mode.to_string(),
            "tsv".to_owned(),
        ]
    }
}

impl Config for TesseractConfig {
    fn path() -> &'static str {
        "ocr_services/tesseract.json"
    }

    fn show_ui(&mut self, ui: &mut egui::Ui) {
        ui.label("Tesseract 4 or newer needs to be installed.");
        ui.horizontal(|ui| {
            ui.label("Command:");
            ui.text_edit_singleline(&mut self.command);
        });
        ui.horizontal(|ui| {
            ui.label("Language:");
            ui.text_edit_singleline(&mut self.language);
        });
        ui.horizontal(|ui| {
            ui.label("Page segmentation mode:");
            ui.add(egui::DragValue::new(&mut self.page_seg_mode).range(0..=13));
        });
    }
}

impl OcrService for Tesseract {
    fn name(&self) -> &'static str {
        "Tesseract"
    }

    fn init(&mut self) -> Result<()> {
        self.config =
            TesseractConfig::load().context("Tesseract: Failed to load configuration file")?;
        Ok(())
    }

    fn terminate(&mut self) -> Result<()> {
        self.config
            .save()
            .context("Tesseract: Failed to save configuration file")?;
        Ok(())
    }

    fn show_config_ui(&mut self, ui: &mut egui::Ui) {
        self.config.show_ui(ui);
    }

    fn recognize(&mut self, image: RgbaImage) -> OcrServiceJob {
        let config = self.config.clone();

        ServiceJob::new(move || {
            let mut buf = Cursor::new(Vec::new());
            image
                .write_to(&mut buf, ImageFormat::Png)
                .context("Tesseract: Failed to encode image as PNG")?;

            let mut child = Command::new(&config.command)
                .args(config.args())
                .stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .spawn()
                .with_context(|| format!("Tesseract: Failed to run `{}`", config.command))?;

            // tesseract reads the whole image before writing anything, so this cannot deadlock
            child
                .stdin
                .take()
                .ok_or_else(|| anyhow!("Tesseract: stdin of the child process is not piped"))?
                .write_all(buf.get_ref())
                .context("Tesseract: Failed to send image")?;

            let output = child
                .wait_with_output()
                .context("Tesseract: Failed to read output")?;

            if !output.status.success() {
                bail!(
                    "Tesseract: `{}` exited with {}: {}",
                    config.command,
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                );
            }

            let tsv = String::from_utf8(output.stdout)
                .context("Tesseract: Output is not UTF-8 encoded text")?;
            parse_tsv(&tsv)
        })
    }
}

// levels of the rows in tesseract's TSV output
const LEVEL_BLOCK: u32 = 2;
const LEVEL_LINE: u32 = 4;
const LEVEL_WORD: u32 = 5;

/// Build a boxed tree from tesseract's TSV output.
///
/// Rows come in reading order, each block followed by its lines, each line by its words.
/// Words without text and lines or blocks left without words are dropped.
pub fn parse_tsv(tsv: &str) -> Result<LocalText> {
    let mut blocks: Vec<TextBlock> = Vec::new();

    // first line is the header
    for (idx, row) in tsv.lines().enumerate().skip(1) {
        if row.trim().is_empty() {
            continue;
        }

        let columns: Vec<&str> = row.splitn(12, '\t').collect();
        if columns.len() < 11 {
            bail!("Tesseract: Row {} has only {} columns", idx + 1, columns.len());
        }

        let number = |column: usize| -> Result<f32> {
            columns[column].trim().parse().with_context(|| {
                format!(
                    "Tesseract: Column {} of row {} is not a number: `{}`",
                    column + 1,
                    idx + 1,
                    columns[column]
                )
            })
        };

        let level = number(0)? as u32;
        let rect = Rect::from_min_size(
            pos2(number(6)?, number(7)?),
            vec2(number(8)?, number(9)?),
        );

        match level {
            LEVEL_BLOCK => blocks.push(TextBlock {
                text: String::new(),
                bounding_box: Some(rect),
                lines: Vec::new(),
            }),
            LEVEL_LINE => current_block(&mut blocks).lines.push(TextLine {
                text: String::new(),
                bounding_box: Some(rect),
                elements: Vec::new(),
            }),
            LEVEL_WORD => {
                let text = columns.get(11).map(|text| text.trim()).unwrap_or_default();
                if text.is_empty() {
                    continue;
                }

                current_line(current_block(&mut blocks))
                    .elements
                    .push(TextElement::new(text, Some(rect)));
            }
            _ => {}
        }
    }

    for block in &mut blocks {
        block.lines.retain(|line| !line.elements.is_empty());
        for line in &mut block.lines {
            line.text = line
                .elements
                .iter()
                .map(|element| element.text.as_str())
                .collect::<Vec<_>>()
                .join(" ");
        }
        block.text = block
            .lines
            .iter()
            .map(|line| line.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
    }
    blocks.retain(|block| !block.lines.is_empty());

    Ok(LocalText { blocks })
}

fn current_block(blocks: &mut Vec<TextBlock>) -> &mut TextBlock {
    if blocks.is_empty() {
        blocks.push(TextBlock::default());
    }
    let last = blocks.len() - 1;
    &mut blocks[last]
}

fn current_line(block: &mut TextBlock) -> &mut TextLine {
    if block.lines.is_empty() {
        block.lines.push(TextLine::default());
    }
    let last = block.lines.len() - 1;
    &mut block.lines[last]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        handles::{extract_local, Extraction, HandleMatch},
        overlay::Overlay,
    };

    const HEADER: &str =
        "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext";

    fn tsv(rows: &[&str]) -> String {
        std::iter::once(HEADER)
            .chain(rows.iter().copied())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn contact_tsv() -> String {
        tsv(&[
            "1\t1\t0\t0\t0\t0\t0\t0\t640\t480\t-1\t",
            "2\t1\t1\t0\t0\t0\t36\t92\t582\t46\t-1\t",
            "3\t1\t1\t1\t0\t0\t36\t92\t582\t46\t-1\t",
            "4\t1\t1\t1\t1\t0\t36\t92\t582\t46\t-1\t",
            "5\t1\t1\t1\t1\t1\t36\t92\t140\t46\t95.9\tContact",
            "5\t1\t1\t1\t1\t2\t190\t92\t290\t46\t91.2\t@raywenderlich",
            "5\t1\t1\t1\t1\t3\t494\t92\t124\t46\t96.4\ttoday",
        ])
    }

    #[test]
    fn words_keep_their_boxes() {
        let text = parse_tsv(&contact_tsv()).unwrap();

        assert_eq!(text.blocks.len(), 1);
        assert_eq!(text.blocks[0].text, "Contact @raywenderlich today");
        assert_eq!(
            text.blocks[0].bounding_box,
            Some(Rect::from_min_size(pos2(36.0, 92.0), vec2(582.0, 46.0)))
        );
        assert!(text.elements().all(|element| element.bounding_box.is_some()));
    }

    #[test]
    fn handle_is_found_with_its_word_box() {
        let extraction = extract_local(&parse_tsv(&contact_tsv()).unwrap());

        assert_eq!(
            extraction.handles(),
            [HandleMatch {
                text: "@raywenderlich".to_owned(),
                bounding_box: Some(Rect::from_min_size(pos2(190.0, 92.0), vec2(290.0, 46.0))),
            }]
        );
        let Extraction::Found { boxes, .. } = extraction else {
            panic!("expected text to be found");
        };
        assert_eq!(boxes.len(), 3);
    }

    #[test]
    fn every_annotation_gets_a_box() {
        let Extraction::Found { handles, boxes } = extract_local(&parse_tsv(&contact_tsv()).unwrap())
        else {
            panic!("expected text to be found");
        };

        let mut overlay = Overlay::default();
        for handle in handles {
            overlay.add_text(handle.text, handle.bounding_box);
        }
        for bounding_box in boxes {
            overlay.add_box(Some(bounding_box));
        }

        assert_eq!(overlay.annotations().len(), 4);
        assert!(overlay
            .annotations()
            .iter()
            .all(|annotation| annotation.rect.is_some()));
    }

    #[test]
    fn empty_words_and_blocks_are_dropped() {
        let text = parse_tsv(&tsv(&[
            "1\t1\t0\t0\t0\t0\t0\t0\t640\t480\t-1\t",
            "2\t1\t1\t0\t0\t0\t0\t0\t640\t480\t-1\t",
            "4\t1\t1\t1\t1\t0\t0\t0\t640\t480\t-1\t",
            "5\t1\t1\t1\t1\t1\t0\t0\t640\t480\t95\t ",
            "",
        ]))
        .unwrap();

        assert!(text.is_empty());
        assert_eq!(extract_local(&text), Extraction::NoText);
        assert!(parse_tsv(HEADER).unwrap().is_empty());
    }

    #[test]
    fn lines_split_across_blocks() {
        let text = parse_tsv(&tsv(&[
            "2\t1\t1\t0\t0\t0\t0\t0\t100\t40\t-1\t",
            "4\t1\t1\t1\t1\t0\t0\t0\t100\t20\t-1\t",
            "5\t1\t1\t1\t1\t1\t0\t0\t40\t20\t90\tfollow",
            "4\t1\t1\t1\t2\t0\t0\t20\t100\t20\t-1\t",
            "5\t1\t1\t1\t2\t1\t0\t20\t40\t20\t90\tme",
            "2\t1\t2\t0\t0\t0\t0\t50\t100\t20\t-1\t",
            "4\t1\t2\t1\t1\t0\t0\t50\t100\t20\t-1\t",
            "5\t1\t2\t1\t1\t1\t0\t50\t60\t20\t90\t@jane",
        ]))
        .unwrap();

        assert_eq!(text.blocks.len(), 2);
        assert_eq!(text.blocks[0].text, "follow\nme");
        assert_eq!(text.blocks[1].lines[0].elements[0].text, "@jane");
    }

    #[test]
    fn malformed_rows_are_errors() {
        assert!(parse_tsv(&tsv(&["5\t1\t1"])).is_err());
        assert!(parse_tsv(&tsv(&["5\t1\t1\t1\t1\t1\tleft\t0\t1\t1\t90\tword"])).is_err());
    }

    #[test]
    fn command_reads_png_from_stdin_and_writes_tsv() {
        assert_eq!(
            TesseractConfig::default().args(),
            ["stdin", "stdout", "-l", "eng", "--psm", "3", "tsv"]
        );
    }
}
