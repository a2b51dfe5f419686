//! Page-level operations the login flow needs
//!
//! [`BrowserSession`](crate::BrowserSession) implements this on top of
//! headless Chrome; tests drive the flow with an in-memory page.

use std::time::Duration;

use crate::error::Result;

/// A single controllable browser page
pub trait PageDriver {
    /// Navigate and wait for the navigation to commit
    fn navigate(&mut self, url: &str) -> Result<()>;

    /// `window.location.href` of the page
    fn current_url(&self) -> Result<String>;

    /// Focus the element matching `selector` and type `text` into it
    fn type_into(&mut self, selector: &str, text: &str, timeout: Duration) -> Result<()>;

    /// Click the element matching `selector`
    fn click(&mut self, selector: &str, timeout: Duration) -> Result<()>;

    /// `(name, value)` of every cookie visible to the page
    fn cookies(&self) -> Result<Vec<(String, String)>>;

    /// Keys currently in `localStorage`
    fn local_storage_keys(&self) -> Result<Vec<String>>;

    /// Raw `localStorage.getItem(key)`
    fn local_storage_item(&self, key: &str) -> Result<Option<String>>;

    /// Shut the browser down
    fn close(&mut self) -> Result<()>;
}
