//! Markdown to styled text blocks
//!
//! Panel bodies are Markdown. Each block is one logical line: a prefix
//! for its first row, a hanging indent for continuation rows, and the
//! text with style ranges. Wrapping to the panel width happens later.

use std::ops::Range;

use nu_ansi_term::{Color, Style};
use pulldown_cmark::{Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use unicode_width::UnicodeWidthStr;

/// Indent in front of fenced and indented code
const CODE_INDENT: &str = "    ";

/// One logical line of rendered Markdown
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Block {
    /// Shown before the first row (bullet, list number, code indent)
    pub prefix: String,
    /// Shown before continuation rows
    pub hang: String,
    pub text: String,
    /// Byte ranges of `text` and their styles, in order, non-overlapping
    pub spans: Vec<(Range<usize>, Style)>,
    /// Horizontal rule spanning the panel
    pub rule: bool,
}

impl Block {
    /// `text[range]` with the styles that apply to it
    pub fn paint(&self, range: Range<usize>, styled: bool) -> String {
        if !styled {
            return self.text[range].to_string();
        }

        let mut out = String::new();
        let mut pos = range.start;
        for (span, style) in &self.spans {
            let start = span.start.max(range.start);
            let end = span.end.min(range.end);
            if start >= end {
                continue;
            }
            out.push_str(&self.text[pos..start]);
            out.push_str(&style.paint(&self.text[start..end]).to_string());
            pos = end;
        }
        out.push_str(&self.text[pos..range.end]);
        out
    }
}

pub fn code_style() -> Style {
    Color::Green.normal()
}

pub fn inline_code_style() -> Style {
    Color::LightMagenta.normal()
}

/// Parse `source` into blocks. Never returns an empty list.
pub fn parse(source: &str) -> Vec<Block> {
    let mut builder = Builder::default();
    for event in Parser::new_ext(source, Options::ENABLE_STRIKETHROUGH) {
        builder.event(event);
    }
    builder.finish()
}

#[derive(Default)]
struct Builder {
    blocks: Vec<Block>,
    current: Option<Block>,
    styles: Vec<Style>,
    /// Next number per open list; `None` for bullet lists
    lists: Vec<Option<u64>>,
    /// Hanging indent per open list item
    hangs: Vec<String>,
    item_prefix: Option<String>,
    code: bool,
    gap: bool,
}

impl Builder {
    fn event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(Tag::Heading { level, .. }) => {
                self.flush();
                let style = match level {
                    HeadingLevel::H1 => self.style().bold().underline(),
                    _ => self.style().bold(),
                };
                self.styles.push(style);
            }
            Event::End(TagEnd::Heading(_)) => {
                self.styles.pop();
                self.flush();
                self.gap = true;
            }
            Event::End(TagEnd::Paragraph) => {
                self.flush();
                if self.hangs.is_empty() {
                    self.gap = true;
                }
            }
            Event::Start(Tag::Strong) => self.styles.push(self.style().bold()),
            Event::Start(Tag::Emphasis) => self.styles.push(self.style().italic()),
            Event::Start(Tag::Strikethrough) => self.styles.push(self.style().strikethrough()),
            Event::End(TagEnd::Strong | TagEnd::Emphasis | TagEnd::Strikethrough) => {
                self.styles.pop();
            }
            Event::Start(Tag::CodeBlock(_)) => {
                self.flush();
                self.code = true;
            }
            Event::End(TagEnd::CodeBlock) => {
                self.code = false;
                self.gap = true;
            }
            Event::Start(Tag::List(start)) => {
                self.flush();
                self.lists.push(start);
            }
            Event::End(TagEnd::List(_)) => {
                self.flush();
                self.lists.pop();
                if self.hangs.is_empty() {
                    self.gap = true;
                }
            }
            Event::Start(Tag::Item) => {
                self.flush();
                let marker = match self.lists.last_mut() {
                    Some(Some(n)) => {
                        let marker = format!("{}. ", n);
                        *n += 1;
                        marker
                    }
                    _ => "• ".to_string(),
                };
                let parent = self.hang();
                self.hangs.push(format!("{}{}", parent, " ".repeat(marker.width())));
                self.item_prefix = Some(format!("{}{}", parent, marker));
            }
            Event::End(TagEnd::Item) => {
                self.flush();
                self.hangs.pop();
                self.item_prefix = None;
            }
            Event::Text(text) if self.code => {
                for line in text.lines() {
                    self.code_line(line);
                }
            }
            Event::Text(text) => self.text(&text, self.style()),
            Event::Code(code) => self.text(&code, inline_code_style()),
            Event::Html(html) | Event::InlineHtml(html) => {
                self.text(html.trim_end_matches('\n'), self.style())
            }
            Event::SoftBreak => self.text(" ", self.style()),
            Event::HardBreak => self.flush(),
            Event::Rule => {
                self.flush();
                self.gap_line();
                self.blocks.push(Block {
                    rule: true,
                    ..Block::default()
                });
                self.gap = true;
            }
            _ => {}
        }
    }

    fn style(&self) -> Style {
        self.styles.last().copied().unwrap_or_default()
    }

    fn hang(&self) -> String {
        self.hangs.last().cloned().unwrap_or_default()
    }

    /// Blank line between blocks, once per gap
    fn gap_line(&mut self) {
        if self.gap && !self.blocks.is_empty() {
            self.blocks.push(Block::default());
        }
        self.gap = false;
    }

    fn open(&mut self) -> &mut Block {
        if self.current.is_none() {
            self.gap_line();
            let hang = self.hang();
            let prefix = self.item_prefix.take().unwrap_or_else(|| hang.clone());
            self.current = Some(Block {
                prefix,
                hang,
                ..Block::default()
            });
        }
        self.current.get_or_insert_with(Block::default)
    }

    fn text(&mut self, text: &str, style: Style) {
        let block = self.open();
        let start = block.text.len();
        block.text.push_str(&text.replace('\t', CODE_INDENT));
        if !style.is_plain() {
            let end = block.text.len();
            block.spans.push((start..end, style));
        }
    }

    fn code_line(&mut self, line: &str) {
        self.flush();
        self.gap_line();
        let indent = format!("{}{}", self.hang(), CODE_INDENT);
        let text = line.replace('\t', CODE_INDENT);
        let spans = if text.is_empty() {
            Vec::new()
        } else {
            vec![(0..text.len(), code_style())]
        };
        self.blocks.push(Block {
            prefix: indent.clone(),
            hang: indent,
            text,
            spans,
            rule: false,
        });
    }

    fn flush(&mut self) {
        if let Some(block) = self.current.take() {
            self.blocks.push(block);
        }
    }

    fn finish(mut self) -> Vec<Block> {
        self.flush();
        if self.blocks.is_empty() {
            self.blocks.push(Block::default());
        }
        self.blocks
    }
}
