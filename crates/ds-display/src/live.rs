//! Live rendering of a streamed reply
//!
//! Fragments are folded into a thinking buffer and a response buffer.
//! After each fragment the panel layout is recomputed and handed to a
//! [`LiveSurface`]; redraws are throttled to the refresh rate. A frame held
//! back by the throttle is drawn on the next refresh tick, or when the
//! stream ends.

use std::io::{self, IsTerminal, Stdout, Write};
use std::time::{Duration, Instant};

use crossterm::{
    cursor::{Hide, MoveToPreviousLine, Show},
    queue,
    terminal::{Clear, ClearType},
};
use ds_core::{ChatFragment, FragmentKind};
use futures::{Stream, StreamExt};
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::panel::{Panel, layout};

/// Default redraw rate
pub const DEFAULT_REFRESH_PER_SECOND: u32 = 10;

/// Shortest refresh tick, used when unthrottled
const MIN_TICK: Duration = Duration::from_millis(1);

/// Where live frames are drawn
pub trait LiveSurface {
    /// Replace the previous frame with `panels`
    fn draw(&mut self, panels: &[Panel]) -> io::Result<()>;

    /// Draw the final frame and leave it on screen
    fn finish(&mut self, panels: &[Panel]) -> io::Result<()>;
}

/// Accumulates fragments and drives a [`LiveSurface`]
pub struct StreamRenderer<S: LiveSurface> {
    surface: S,
    thinking_enabled: bool,
    interval: Duration,
    thinking: String,
    response: String,
    last_draw: Option<Instant>,
    shown: Option<Vec<Panel>>,
    pending: Option<Vec<Panel>>,
}

impl<S: LiveSurface> StreamRenderer<S> {
    pub fn new(surface: S, thinking_enabled: bool) -> Self {
        Self {
            surface,
            thinking_enabled,
            interval: interval_for(DEFAULT_REFRESH_PER_SECOND),
            thinking: String::new(),
            response: String::new(),
            last_draw: None,
            shown: None,
            pending: None,
        }
    }

    pub fn refresh_per_second(mut self, rate: u32) -> Self {
        self.interval = interval_for(rate);
        self
    }

    /// Draw on every accepted fragment
    pub fn unthrottled(mut self) -> Self {
        self.interval = Duration::ZERO;
        self
    }

    pub fn thinking(&self) -> &str {
        &self.thinking
    }

    pub fn response(&self) -> &str {
        &self.response
    }

    /// Fold one fragment in. Empty fragments are ignored.
    pub fn push(&mut self, fragment: &ChatFragment) -> io::Result<()> {
        if fragment.is_empty() {
            return Ok(());
        }

        match fragment.kind {
            FragmentKind::Think => self.thinking.push_str(&fragment.text),
            FragmentKind::Response => self.response.push_str(&fragment.text),
        }

        let panels = layout(&self.thinking, &self.response, self.thinking_enabled);
        if panels.is_empty() {
            return Ok(());
        }

        let due = self
            .last_draw
            .is_none_or(|at| at.elapsed() >= self.interval);

        if due {
            self.surface.draw(&panels)?;
            self.last_draw = Some(Instant::now());
            self.shown = Some(panels);
            self.pending = None;
        } else {
            self.pending = Some(panels);
        }

        Ok(())
    }

    /// Draw the frame held back by the throttle, once the interval has passed
    pub fn tick(&mut self) -> io::Result<()> {
        let due = self
            .last_draw
            .is_none_or(|at| at.elapsed() >= self.interval);
        if !due {
            return Ok(());
        }

        if let Some(panels) = self.pending.take() {
            self.surface.draw(&panels)?;
            self.last_draw = Some(Instant::now());
            self.shown = Some(panels);
        }
        Ok(())
    }

    /// Flush the last frame and return the assembled response.
    ///
    /// The thinking buffer is dropped.
    pub fn finish(mut self) -> io::Result<String> {
        if let Some(panels) = self.pending.take().or(self.shown.take()) {
            self.surface.finish(&panels)?;
        }

        debug!(
            "Stream finished: {} thinking chars, {} response chars",
            self.thinking.len(),
            self.response.len()
        );

        Ok(self.response)
    }

    /// Consume a finite sequence of fragments
    pub fn run<I>(mut self, fragments: I) -> io::Result<String>
    where
        I: IntoIterator<Item = ChatFragment>,
    {
        for fragment in fragments {
            self.push(&fragment)?;
        }
        self.finish()
    }

    /// Consume a fragment stream. While the producer is quiet, held-back
    /// frames are drawn at the refresh rate.
    pub async fn run_stream<St>(mut self, fragments: St) -> io::Result<String>
    where
        St: Stream<Item = ChatFragment>,
    {
        let mut fragments = std::pin::pin!(fragments);
        let mut ticker = tokio::time::interval(self.interval.max(MIN_TICK));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                fragment = fragments.next() => match fragment {
                    Some(fragment) => self.push(&fragment)?,
                    None => break,
                },
                _ = ticker.tick() => self.tick()?,
            }
        }
        self.finish()
    }
}

fn interval_for(rate: u32) -> Duration {
    Duration::from_secs(1) / rate.max(1)
}

/// Render `fragments` live on `surface` at the default rate and return the response text
pub fn stream_live<S, I>(surface: S, fragments: I, thinking_enabled: bool) -> io::Result<String>
where
    S: LiveSurface,
    I: IntoIterator<Item = ChatFragment>,
{
    StreamRenderer::new(surface, thinking_enabled).run(fragments)
}

/// Async counterpart of [`stream_live`]
pub async fn stream_live_async<S, St>(
    surface: S,
    fragments: St,
    thinking_enabled: bool,
) -> io::Result<String>
where
    S: LiveSurface,
    St: Stream<Item = ChatFragment>,
{
    StreamRenderer::new(surface, thinking_enabled)
        .run_stream(fragments)
        .await
}

/// In-place terminal rendering with crossterm
pub struct TerminalSurface<W: Write = Stdout> {
    out: W,
    styled: bool,
    fixed_size: Option<(u16, u16)>,
    drawn_lines: usize,
}

impl TerminalSurface<Stdout> {
    pub fn stdout() -> Self {
        let out = io::stdout();
        let styled = out.is_terminal();
        Self::new(out, styled)
    }
}

impl<W: Write> TerminalSurface<W> {
    pub fn new(out: W, styled: bool) -> Self {
        Self {
            out,
            styled,
            fixed_size: None,
            drawn_lines: 0,
        }
    }

    /// Use a fixed size instead of querying the terminal
    pub fn with_size(mut self, width: u16, height: u16) -> Self {
        self.fixed_size = Some((width, height));
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn size(&self) -> (usize, usize) {
        let (w, h) = self
            .fixed_size
            .or_else(|| crossterm::terminal::size().ok())
            .unwrap_or((80, 24));
        (w as usize, h as usize)
    }

    fn lines(&self, panels: &[Panel], width: usize) -> Vec<String> {
        panels
            .iter()
            .flat_map(|panel| panel.render(width, self.styled))
            .collect()
    }

    fn clear_previous(&mut self) -> io::Result<()> {
        if self.drawn_lines > 0 {
            let up = u16::try_from(self.drawn_lines).unwrap_or(u16::MAX);
            queue!(self.out, MoveToPreviousLine(up), Clear(ClearType::FromCursorDown))?;
        }
        Ok(())
    }

    fn write_lines(&mut self, lines: &[String]) -> io::Result<()> {
        for line in lines {
            writeln!(self.out, "{}", line)?;
        }
        self.out.flush()
    }
}

impl<W: Write> LiveSurface for TerminalSurface<W> {
    fn draw(&mut self, panels: &[Panel]) -> io::Result<()> {
        let (width, height) = self.size();
        let mut lines = self.lines(panels, width);

        // keep the tail visible; lines above the screen cannot be redrawn
        let max_lines = height.saturating_sub(1).max(1);
        if lines.len() > max_lines {
            lines.drain(..lines.len() - max_lines);
        }

        if self.drawn_lines == 0 && self.styled {
            queue!(self.out, Hide)?;
        }
        self.clear_previous()?;
        self.write_lines(&lines)?;
        self.drawn_lines = lines.len();

        Ok(())
    }

    fn finish(&mut self, panels: &[Panel]) -> io::Result<()> {
        let (width, _) = self.size();
        let lines = self.lines(panels, width);

        self.clear_previous()?;
        if self.styled {
            queue!(self.out, Show)?;
        }
        self.write_lines(&lines)?;
        self.drawn_lines = 0;

        Ok(())
    }
}
