//! Bordered text panels and the thinking/response layout

use std::ops::Range;

use nu_ansi_term::{Color, Style};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::markdown::{self, Block};

/// Body shown in the response panel before any text arrived
pub const PLACEHOLDER: &str = "...";

const MIN_WIDTH: usize = 20;
const PAD_X: usize = 2;
const PAD_Y: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelKind {
    Thinking,
    Response,
}

/// One panel of the live display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Panel {
    pub kind: PanelKind,
    pub body: String,
}

/// Panels to show for the current buffers.
///
/// The thinking panel appears only when enabled and non-empty. The response
/// panel appears once it has text, or as a placeholder while no thinking
/// has started yet.
pub fn layout(thinking: &str, response: &str, thinking_enabled: bool) -> Vec<Panel> {
    let mut panels = Vec::with_capacity(2);

    if thinking_enabled && !thinking.is_empty() {
        panels.push(Panel {
            kind: PanelKind::Thinking,
            body: thinking.to_string(),
        });
    }

    if !response.is_empty() || thinking.is_empty() {
        let body = if response.is_empty() { PLACEHOLDER } else { response };
        panels.push(Panel {
            kind: PanelKind::Response,
            body: body.to_string(),
        });
    }

    panels
}

impl Panel {
    pub fn title(&self) -> &'static str {
        match self.kind {
            PanelKind::Thinking => "💭 Thinking",
            PanelKind::Response => "✨ DeepSeek",
        }
    }

    pub fn subtitle(&self) -> Option<&'static str> {
        match self.kind {
            PanelKind::Thinking => Some("razonamiento interno"),
            PanelKind::Response => None,
        }
    }

    fn border(&self) -> Style {
        match self.kind {
            PanelKind::Thinking => Color::Yellow.normal(),
            PanelKind::Response => Color::LightCyan.normal(),
        }
    }

    fn title_style(&self) -> Style {
        match self.kind {
            PanelKind::Thinking => Color::Yellow.bold(),
            PanelKind::Response => Color::White.bold(),
        }
    }

    /// Render to terminal lines, each exactly `width` columns wide.
    ///
    /// The body is rendered as Markdown and wrapped inside the padding.
    pub fn render(&self, width: usize, styled: bool) -> Vec<String> {
        let width = width.max(MIN_WIDTH);
        let inner = width - 2;
        let text_width = inner - 2 * PAD_X;

        let paint = |style: Style, text: &str| -> String {
            if styled {
                style.paint(text).to_string()
            } else {
                text.to_string()
            }
        };
        let border = self.border();
        let side = paint(border, "│");

        let mut lines = Vec::new();

        // ╭─ title ──────╮
        let title = format!(" {} ", self.title());
        let fill = inner.saturating_sub(1 + title.width());
        lines.push(format!(
            "{}{}{}",
            paint(border, "╭─"),
            paint(self.title_style(), &title),
            paint(border, &format!("{}╮", "─".repeat(fill))),
        ));

        let blank = format!("{}{}{}", side, " ".repeat(inner), side);
        for _ in 0..PAD_Y {
            lines.push(blank.clone());
        }

        let rows = markdown::parse(&self.body)
            .iter()
            .flat_map(|block| block_rows(block, text_width, styled))
            .collect::<Vec<_>>();

        for (row, row_width) in rows {
            let pad = text_width.saturating_sub(row_width);
            lines.push(format!(
                "{}{}{}{}{}",
                side,
                " ".repeat(PAD_X),
                row,
                " ".repeat(pad + PAD_X),
                side,
            ));
        }

        for _ in 0..PAD_Y {
            lines.push(blank.clone());
        }

        // ╰──── subtitle ─╯
        match self.subtitle() {
            Some(subtitle) if subtitle.width() + 4 <= inner => {
                let subtitle = format!(" {} ", subtitle);
                let fill = inner - 1 - subtitle.width();
                lines.push(format!(
                    "{}{}{}",
                    paint(border, &format!("╰{}", "─".repeat(fill))),
                    paint(Style::new().dimmed(), &subtitle),
                    paint(border, "─╯"),
                ));
            }
            _ => lines.push(paint(border, &format!("╰{}╯", "─".repeat(inner)))),
        }

        lines
    }
}

/// Row byte ranges of `line` wrapped to `width` columns. Words wider than
/// a row are split between characters, keeping zero-width marks (variation
/// selectors, joiners, combining accents) with the character before them.
pub fn wrap_ranges(line: &str, width: usize) -> Vec<Range<usize>> {
    let width = width.max(1);
    let mut rows = Vec::new();
    let mut row: Option<Range<usize>> = None;
    let mut offset = 0;

    for word in line.split(' ') {
        let start = offset;
        let end = start + word.len();
        offset = end + 1;

        if let Some(current) = &mut row {
            if line[current.start..end].width() <= width {
                current.end = end;
                continue;
            }
            rows.push(current.clone());
            row = None;
        }

        if word.is_empty() {
            continue;
        }
        if word.width() <= width {
            row = Some(start..end);
            continue;
        }

        let mut piece = start..start;
        for (at, cluster) in clusters(word) {
            let at = start + at;
            let cluster_end = at + cluster.len();
            if !piece.is_empty() && line[piece.start..cluster_end].width() > width {
                rows.push(piece.clone());
                piece = at..at;
            }
            piece.end = cluster_end;
        }
        row = Some(piece);
    }

    match row {
        Some(current) => rows.push(current),
        None if rows.is_empty() => rows.push(0..0),
        None => {}
    }
    rows
}

/// Characters with their trailing zero-width marks, as (byte offset, text)
fn clusters(word: &str) -> Vec<(usize, &str)> {
    let mut out: Vec<(usize, &str)> = Vec::new();
    for (i, ch) in word.char_indices() {
        let end = i + ch.len_utf8();
        match out.last_mut() {
            Some((start, cluster)) if ch.width().unwrap_or(0) == 0 => {
                *cluster = &word[*start..end];
            }
            _ => out.push((i, &word[i..end])),
        }
    }
    out
}

/// Wrapped rows of one Markdown block, with their display widths
fn block_rows(block: &Block, width: usize, styled: bool) -> Vec<(String, usize)> {
    if block.rule {
        let rule = "─".repeat(width);
        let text = if styled {
            Style::new().dimmed().paint(rule).to_string()
        } else {
            rule
        };
        return vec![(text, width)];
    }

    let lead_width = block.prefix.width().max(block.hang.width());
    let available = width.saturating_sub(lead_width).max(1);

    wrap_ranges(&block.text, available)
        .into_iter()
        .enumerate()
        .map(|(i, range)| {
            let lead = if i == 0 { &block.prefix } else { &block.hang };
            let row_width = lead.width() + block.text[range.clone()].width();
            (format!("{}{}", lead, block.paint(range, styled)), row_width)
        })
        .collect()
}
