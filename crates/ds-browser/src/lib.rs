//! ds-browser: credential extraction for ds-session
//!
//! Drives a headless Chrome through the chat site's sign-in form and
//! captures the resulting session cookies and auth token.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ds_browser::CredentialExtractor;
//! use ds_core::Config;
//! use ds_display::Console;
//!
//! let config = Config::load()?;
//! let mut console = Console::stdout();
//! if let Some(creds) = CredentialExtractor::new(&config).extract_credentials(&mut console) {
//!     println!("{} cookies", creds.cookies.len());
//! }
//! ```

pub mod error;
pub mod extractor;
pub mod page;
pub mod session;

pub use error::{BrowserError, Result};
pub use extractor::{CredentialExtractor, Pacing, TOKEN_KEYS};
pub use page::PageDriver;
pub use session::BrowserSession;
