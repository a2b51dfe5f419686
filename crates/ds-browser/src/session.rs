//! Browser session management
//!
//! Owns one headless Chrome process for the duration of a login.

use std::ffi::OsStr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use ds_core::BrowserConfig;
use headless_chrome::{Browser, LaunchOptionsBuilder, Tab};
use tracing::{debug, info};

use crate::error::{BrowserError, Result};
use crate::page::PageDriver;

const WINDOW_WIDTH: u32 = 1920;
const WINDOW_HEIGHT: u32 = 1080;

/// Chrome command-line switches for a launch
fn launch_args(config: &BrowserConfig) -> Vec<String> {
    let mut args = vec![
        format!("--window-size={},{}", WINDOW_WIDTH, WINDOW_HEIGHT),
        "--no-sandbox".to_string(),
        "--disable-setuid-sandbox".to_string(),
        "--disable-dev-shm-usage".to_string(),
    ];

    if config.headless {
        args.push("--disable-gpu".to_string());
        args.push("--disable-software-rasterizer".to_string());
    }

    args
}

/// The CDP connection must outlive the longest blind wait of the flow
fn idle_timeout(config: &BrowserConfig) -> Duration {
    let waits = 2 * config.page_load_wait + config.auth_wait + 3 * config.element_timeout;
    Duration::from_secs(waits.max(30) + 30)
}

/// Managed browser session
pub struct BrowserSession {
    browser: Option<Browser>,
}

impl BrowserSession {
    /// Launch a browser according to `config`
    pub fn launch(config: &BrowserConfig) -> Result<Self> {
        info!(
            "Creating browser session (headless: {}, executable: {})",
            config.headless,
            config.executable_path.as_deref().unwrap_or("auto")
        );

        let args = launch_args(config);
        let os_args: Vec<&OsStr> = args.iter().map(OsStr::new).collect();

        let launch_options = LaunchOptionsBuilder::default()
            .headless(config.headless)
            .path(config.executable_path.as_ref().map(PathBuf::from))
            .idle_browser_timeout(idle_timeout(config))
            .args(os_args)
            .build()
            .map_err(|e| {
                BrowserError::Initialization(format!("Failed to build launch options: {}", e))
            })?;

        let browser = Browser::new(launch_options).map_err(|e| {
            BrowserError::Initialization(format!("Failed to launch browser: {}", e))
        })?;

        info!("Browser session created successfully");

        Ok(Self {
            browser: Some(browser),
        })
    }

    fn browser(&self) -> Result<&Browser> {
        self.browser.as_ref().ok_or(BrowserError::Closed)
    }

    /// Get the active tab, opening one if the browser has none
    pub fn active_tab(&self) -> Result<Arc<Tab>> {
        let browser = self.browser()?;

        let first = {
            let tabs = browser.get_tabs();
            let tabs_guard = tabs
                .lock()
                .map_err(|e| BrowserError::TabError(format!("Failed to lock tabs: {}", e)))?;
            tabs_guard.first().cloned()
        };

        match first {
            Some(tab) => Ok(tab),
            None => browser
                .new_tab()
                .map_err(|e| BrowserError::TabError(format!("Failed to create new tab: {}", e))),
        }
    }

    /// Execute JavaScript and return its JSON value
    pub fn evaluate_js(&self, script: &str) -> Result<serde_json::Value> {
        let tab = self.active_tab()?;

        debug!("Executing JavaScript: {}", ds_core::preview(script, 50));

        let result = tab.evaluate(script, false).map_err(|e| {
            BrowserError::Extraction(format!("JavaScript execution failed: {}", e))
        })?;

        Ok(result.value.unwrap_or(serde_json::Value::Null))
    }
}

impl PageDriver for BrowserSession {
    fn navigate(&mut self, url: &str) -> Result<()> {
        let tab = self.active_tab()?;

        info!("Navigating to: {}", url);

        tab.navigate_to(url)
            .map_err(|e| {
                BrowserError::Navigation(format!("Failed to navigate to {}: {}", url, e))
            })?
            .wait_until_navigated()
            .map_err(|e| BrowserError::Navigation(format!("Navigation timeout: {}", e)))?;

        Ok(())
    }

    fn current_url(&self) -> Result<String> {
        let value = self.evaluate_js("window.location.href")?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| BrowserError::Extraction("location.href is not a string".to_string()))
    }

    fn type_into(&mut self, selector: &str, text: &str, timeout: Duration) -> Result<()> {
        let tab = self.active_tab()?;

        debug!("Typing into element: {} ({} chars)", selector, text.chars().count());

        tab.wait_for_element_with_custom_timeout(selector, timeout)
            .map_err(|e| {
                BrowserError::ElementNotFound(format!("Element '{}' not found: {}", selector, e))
            })?
            .click()
            .map_err(|e| {
                BrowserError::Interaction(format!("Failed to focus '{}': {}", selector, e))
            })?;

        tab.type_str(text)
            .map_err(|e| BrowserError::Interaction(format!("Failed to type text: {}", e)))?;

        Ok(())
    }

    fn click(&mut self, selector: &str, timeout: Duration) -> Result<()> {
        let tab = self.active_tab()?;

        debug!("Clicking element: {}", selector);

        tab.wait_for_element_with_custom_timeout(selector, timeout)
            .map_err(|e| {
                BrowserError::ElementNotFound(format!("Element '{}' not found: {}", selector, e))
            })?
            .click()
            .map_err(|e| {
                BrowserError::Interaction(format!("Failed to click '{}': {}", selector, e))
            })?;

        Ok(())
    }

    fn cookies(&self) -> Result<Vec<(String, String)>> {
        let tab = self.active_tab()?;

        let cookies = tab
            .get_cookies()
            .map_err(|e| BrowserError::Cookie(format!("Failed to read cookies: {}", e)))?;

        Ok(cookies.into_iter().map(|c| (c.name, c.value)).collect())
    }

    fn local_storage_keys(&self) -> Result<Vec<String>> {
        // arrays are not returned by value, so round-trip through JSON
        let value = self.evaluate_js("JSON.stringify(Object.keys(localStorage))")?;
        let json = value
            .as_str()
            .ok_or_else(|| BrowserError::Extraction("localStorage keys unavailable".to_string()))?;

        serde_json::from_str(json).map_err(|e| {
            BrowserError::Extraction(format!("Failed to parse localStorage keys: {}", e))
        })
    }

    fn local_storage_item(&self, key: &str) -> Result<Option<String>> {
        let quoted = serde_json::Value::String(key.to_string()).to_string();
        let value = self.evaluate_js(&format!("localStorage.getItem({})", quoted))?;
        Ok(value.as_str().map(str::to_string))
    }

    fn close(&mut self) -> Result<()> {
        if self.browser.take().is_some() {
            // dropping the handle kills the browser process
            info!("Closing browser session");
        }
        Ok(())
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        if self.browser.is_some() {
            debug!("Browser session dropped without close");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_launch_args_headless() {
        let config = BrowserConfig::default();
        let args = launch_args(&config);
        assert!(args.contains(&"--window-size=1920,1080".to_string()));
        assert!(args.contains(&"--no-sandbox".to_string()));
        assert!(args.contains(&"--disable-gpu".to_string()));
    }

    #[test]
    fn test_launch_args_visible() {
        let config = BrowserConfig {
            headless: false,
            ..Default::default()
        };
        let args = launch_args(&config);
        assert!(!args.contains(&"--disable-gpu".to_string()));
    }

    #[test]
    fn test_idle_timeout_covers_waits() {
        let config = BrowserConfig {
            auth_wait: 120,
            ..Default::default()
        };
        // 2*5 + 120 + 3*10 = 160, plus margin
        assert_eq!(idle_timeout(&config), Duration::from_secs(190));

        let quick = BrowserConfig {
            page_load_wait: 0,
            auth_wait: 0,
            element_timeout: 1,
            ..Default::default()
        };
        assert_eq!(idle_timeout(&quick), Duration::from_secs(60));
    }
}
