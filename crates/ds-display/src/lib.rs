//! ds-display: terminal output for ds-session
//!
//! - [`Console`]: `[DeepSeek] message` status lines, response rule, farewell
//! - [`StreamRenderer`]: live thinking/response panels for a streamed reply,
//!   with Markdown bodies
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ds_core::ChatFragment;
//! use ds_display::{TerminalSurface, stream_live};
//!
//! let fragments = vec![ChatFragment::think("hm"), ChatFragment::response("Hello")];
//! let reply = stream_live(TerminalSurface::stdout(), fragments, true)?;
//! ```

pub mod console;
pub mod live;
pub mod markdown;
pub mod panel;

pub use console::{Console, Severity, StatusSink};
pub use live::{LiveSurface, StreamRenderer, TerminalSurface, stream_live, stream_live_async};
pub use panel::{Panel, PanelKind, layout};
