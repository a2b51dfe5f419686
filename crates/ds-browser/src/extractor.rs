//! Scripted sign-in and credential capture
//!
//! The flow is strictly sequential: open the sign-in page, fill the form,
//! wait, then read cookies and the auth token out of the page. Page
//! readiness is not observed; fixed pauses stand in for it.

use std::thread;
use std::time::Duration;

use ds_core::credentials::preview;
use ds_core::{BrowserConfig, Config, SessionCredentials, SessionState};
use ds_display::{Severity, StatusSink};
use serde_json::Value;
use tracing::{debug, error, info};

use crate::error::Result;
use crate::page::PageDriver;
use crate::session::BrowserSession;

const FORM_ROOT: &str =
    "#root > div > div > div._99ad066 > div.ds-theme > div > div.ds-sign-in-form__main > div";

/// `localStorage` keys that may hold the token, in lookup order
pub const TOKEN_KEYS: [&str; 4] = ["userToken", "token", "auth_token", "accessToken"];

/// Fixed pauses of the flow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    /// After each navigation
    pub page_load: Duration,
    /// After typing into each field
    pub field: Duration,
    /// After clicking submit
    pub auth: Duration,
    /// Bound for each element lookup
    pub element_timeout: Duration,
}

impl Pacing {
    pub fn from_config(config: &BrowserConfig) -> Self {
        Self {
            page_load: config.page_load_wait(),
            field: Duration::from_secs(1),
            auth: config.auth_wait(),
            element_timeout: config.element_timeout(),
        }
    }
}

fn email_selector() -> String {
    format!("{FORM_ROOT} > div:nth-child(1) > div.ds-form-item__content > div input")
}

fn password_selector() -> String {
    format!("{FORM_ROOT} > div:nth-child(2) > div.ds-form-item__content > div > input")
}

fn login_button_selector() -> String {
    format!("{FORM_ROOT} > button")
}

/// Logs into the chat site and captures its session credentials
pub struct CredentialExtractor<'a> {
    config: &'a Config,
    pacing: Pacing,
}

impl<'a> CredentialExtractor<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self {
            config,
            pacing: Pacing::from_config(&config.browser),
        }
    }

    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    /// Run the login in a freshly launched Chrome
    pub fn extract_credentials(&self, sink: &mut dyn StatusSink) -> Option<SessionCredentials> {
        let browser = &self.config.browser;
        self.extract_with(|| BrowserSession::launch(browser), sink)
    }

    /// Run the login on the page produced by `launch`.
    ///
    /// Returns `None` when the browser cannot be launched or any step of
    /// the login fails. The page is closed exactly once after a successful
    /// launch, whatever the outcome; close errors are ignored.
    pub fn extract_with<P, F>(&self, launch: F, sink: &mut dyn StatusSink) -> Option<SessionCredentials>
    where
        P: PageDriver,
        F: FnOnce() -> Result<P>,
    {
        sink.status("Starting browser (this might take a sec)...", Severity::Progress);

        let mut page = match launch() {
            Ok(page) => page,
            Err(e) => {
                error!("Browser launch failed: {}", e);
                sink.status(&format!("Login failed: {}", e), Severity::Error);
                return None;
            }
        };

        let outcome = match self.login(&mut page, sink) {
            Ok(credentials) => Some(credentials),
            Err(e) => {
                error!("Login failed: {}", e);
                sink.status(&format!("Login failed: {}", e), Severity::Error);
                None
            }
        };

        if let Err(e) = page.close() {
            debug!("Ignoring browser close error: {}", e);
        }

        outcome
    }

    fn login<P: PageDriver>(
        &self,
        page: &mut P,
        sink: &mut dyn StatusSink,
    ) -> Result<SessionCredentials> {
        let sign_in_url = self.config.sign_in_url();
        let timeout = self.pacing.element_timeout;

        page.navigate(&sign_in_url)?;

        sink.status("Waiting for page to load...", Severity::Info);
        pause(self.pacing.page_load);

        let current_url = page.current_url()?;
        sink.status(&format!("Current URL: {}", current_url), Severity::Info);

        if !current_url.contains("/sign_in") {
            sink.status("Not on sign-in page, navigating...", Severity::Progress);
            page.navigate(&sign_in_url)?;
            pause(self.pacing.page_load);
        }

        sink.status("Filling in login details...", Severity::Info);

        page.type_into(&email_selector(), &self.config.account.email, timeout)?;
        pause(self.pacing.field);

        page.type_into(&password_selector(), &self.config.account.password, timeout)?;
        pause(self.pacing.field);

        sink.status("Clicking login button...", Severity::Info);
        page.click(&login_button_selector(), timeout)?;

        sink.status(
            &format!("Waiting {} seconds for login...", self.pacing.auth.as_secs()),
            Severity::Progress,
        );
        pause(self.pacing.auth);

        sink.status("Grabbing cookies...", Severity::Info);
        let mut credentials = SessionCredentials::from_cookie_pairs(page.cookies()?);

        sink.status("Getting auth token...", Severity::Info);
        let token = match resolve_token(page, sink) {
            Ok(token) => token,
            Err(e) => {
                sink.status(&format!("Token extraction failed: {}", e), Severity::Error);
                None
            }
        };

        match &token {
            Some(token) => {
                sink.status(&format!("Got token: {}...", preview(token, 20)), Severity::Success)
            }
            None => sink.status("Couldn't find token in localStorage", Severity::Error),
        }
        credentials.token = token;

        let storage = &self.config.storage;
        credentials.save_token(&storage.token_file)?;
        credentials.save_cookies(&storage.cookies_file)?;
        SessionState::record_login(&storage.state_file)?;

        info!(
            "Saved {} cookies to {}",
            credentials.cookies.len(),
            storage.cookies_file.display()
        );
        sink.status(
            &format!("Success! Got {} cookies", credentials.cookies.len()),
            Severity::Success,
        );

        match credentials.session_id() {
            Some(id) => sink.status(&format!("Session ID: {}...", preview(id, 20)), Severity::Success),
            None => sink.status("No session ID found", Severity::Error),
        }

        Ok(credentials)
    }
}

fn pause(duration: Duration) {
    if !duration.is_zero() {
        thread::sleep(duration);
    }
}

/// List the storage keys, then look the token up under [`TOKEN_KEYS`]
fn resolve_token<P: PageDriver>(page: &P, sink: &mut dyn StatusSink) -> Result<Option<String>> {
    let keys = page.local_storage_keys()?;
    sink.status(&format!("localStorage keys: {:?}", keys), Severity::Info);

    Ok(find_token(page, sink))
}

/// First non-empty token among [`TOKEN_KEYS`]; lookup errors skip to the next key
pub fn find_token<P: PageDriver>(page: &P, sink: &mut dyn StatusSink) -> Option<String> {
    for key in TOKEN_KEYS {
        let raw = match page.local_storage_item(key) {
            Ok(Some(raw)) if !raw.is_empty() => raw,
            Ok(_) => continue,
            Err(e) => {
                debug!("Skipping token key '{}': {}", key, e);
                continue;
            }
        };

        sink.status(
            &format!("Found key '{}': {}...", key, preview(&raw, 50)),
            Severity::Info,
        );

        if let Some(token) = token_from_raw(&raw) {
            return Some(token);
        }
    }

    None
}

/// Token stored under one key: the `.value` field of a JSON payload, or
/// the raw string when it is not JSON.
///
/// A JSON `null` has no fields to read, so like unparsable text it is
/// taken as the raw token.
pub fn token_from_raw(raw: &str) -> Option<String> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Null) => Some(raw.to_string()),
        Ok(parsed) => match parsed.get("value") {
            Some(Value::String(token)) if !token.is_empty() => Some(token.clone()),
            Some(Value::Number(token)) => Some(token.to_string()),
            _ => None,
        },
        Err(_) => Some(raw.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BrowserError;
    use std::cell::RefCell;
    use std::collections::{BTreeMap, HashMap};
    use std::rc::Rc;
    use tempfile::TempDir;

    type Log = Rc<RefCell<Vec<String>>>;

    /// In-memory page recording every call
    struct FakePage {
        log: Log,
        url_after_first_nav: String,
        navigations: usize,
        cookies: Vec<(String, String)>,
        storage: HashMap<String, String>,
        broken_keys: Vec<&'static str>,
        keys_fail: bool,
        missing_selector: Option<String>,
        close_fails: bool,
    }

    impl FakePage {
        fn new(log: &Log) -> Self {
            Self {
                log: Rc::clone(log),
                url_after_first_nav: "https://chat.example.com/sign_in".to_string(),
                navigations: 0,
                cookies: vec![
                    ("ds_session_id".to_string(), "sess-0123456789abcdefghij".to_string()),
                    ("HWWAFSESID".to_string(), "a b%20c".to_string()),
                ],
                storage: HashMap::new(),
                broken_keys: Vec::new(),
                keys_fail: false,
                missing_selector: None,
                close_fails: false,
            }
        }

        fn with_item(mut self, key: &str, value: &str) -> Self {
            self.storage.insert(key.to_string(), value.to_string());
            self
        }

        fn record(&self, entry: String) {
            self.log.borrow_mut().push(entry);
        }

        fn find(&self, selector: &str) -> Result<()> {
            if self.missing_selector.as_deref() == Some(selector) {
                return Err(BrowserError::ElementNotFound(selector.to_string()));
            }
            Ok(())
        }
    }

    impl PageDriver for FakePage {
        fn navigate(&mut self, url: &str) -> Result<()> {
            self.navigations += 1;
            self.record(format!("navigate {}", url));
            Ok(())
        }

        fn current_url(&self) -> Result<String> {
            if self.navigations == 1 {
                Ok(self.url_after_first_nav.clone())
            } else {
                Ok("https://chat.example.com/sign_in".to_string())
            }
        }

        fn type_into(&mut self, selector: &str, text: &str, _timeout: Duration) -> Result<()> {
            self.find(selector)?;
            self.record(format!("type {}", text));
            Ok(())
        }

        fn click(&mut self, selector: &str, _timeout: Duration) -> Result<()> {
            self.find(selector)?;
            self.record("click".to_string());
            Ok(())
        }

        fn cookies(&self) -> Result<Vec<(String, String)>> {
            Ok(self.cookies.clone())
        }

        fn local_storage_keys(&self) -> Result<Vec<String>> {
            if self.keys_fail {
                return Err(BrowserError::Extraction("storage disabled".to_string()));
            }
            Ok(self.storage.keys().cloned().collect())
        }

        fn local_storage_item(&self, key: &str) -> Result<Option<String>> {
            self.record(format!("get {}", key));
            if self.broken_keys.iter().any(|k| *k == key) {
                return Err(BrowserError::Extraction("evaluate failed".to_string()));
            }
            Ok(self.storage.get(key).cloned())
        }

        fn close(&mut self) -> Result<()> {
            self.record("close".to_string());
            if self.close_fails {
                return Err(BrowserError::Closed);
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct Messages(Vec<(String, Severity)>);

    impl StatusSink for Messages {
        fn status(&mut self, message: &str, severity: Severity) {
            self.0.push((message.to_string(), severity));
        }
    }

    impl Messages {
        fn contains(&self, needle: &str) -> bool {
            self.0.iter().any(|(m, _)| m.contains(needle))
        }
    }

    fn test_config(dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.site.base_url = "https://chat.example.com".to_string();
        config.account.email = "user@example.com".to_string();
        config.account.password = "hunter2".to_string();
        config.storage.cookies_file = dir.path().join("cookies.json");
        config.storage.token_file = dir.path().join("token.txt");
        config.storage.state_file = dir.path().join("state.json");
        config
    }

    fn no_waits() -> Pacing {
        Pacing {
            page_load: Duration::ZERO,
            field: Duration::ZERO,
            auth: Duration::ZERO,
            element_timeout: Duration::from_millis(10),
        }
    }

    fn run(config: &Config, page: FakePage, sink: &mut Messages) -> Option<SessionCredentials> {
        CredentialExtractor::new(config)
            .with_pacing(no_waits())
            .extract_with(move || Ok(page), sink)
    }

    fn count(log: &Log, entry: &str) -> usize {
        log.borrow().iter().filter(|e| e.as_str() == entry).count()
    }

    #[test]
    fn test_successful_login_persists_everything() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let log = Log::default();
        let page = FakePage::new(&log).with_item("userToken", r#"{"value":"tok-abc","__version":"0"}"#);
        let mut sink = Messages::default();

        let creds = run(&config, page, &mut sink).expect("login should succeed");

        assert_eq!(creds.token.as_deref(), Some("tok-abc"));
        assert_eq!(creds.session_id(), Some("sess-0123456789abcdefghij"));

        let saved: BTreeMap<String, String> =
            serde_json::from_str(&std::fs::read_to_string(&config.storage.cookies_file).unwrap())
                .unwrap();
        assert_eq!(saved, creds.cookies);
        assert_eq!(saved["HWWAFSESID"], "a b%20c");

        assert_eq!(std::fs::read_to_string(&config.storage.token_file).unwrap(), "tok-abc");

        let state = SessionState::load(&config.storage.state_file).unwrap();
        assert!(state.last_login.is_some());

        assert_eq!(count(&log, "close"), 1);
        assert_eq!(count(&log, "type user@example.com"), 1);
        assert_eq!(count(&log, "type hunter2"), 1);
        assert!(sink.contains("Success! Got 2 cookies"));
        assert!(sink.contains("Session ID: sess-0123456789abcde..."));
    }

    #[test]
    fn test_token_keys_tried_in_order_until_first_hit() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let log = Log::default();
        let page = FakePage::new(&log)
            .with_item("token", "raw-token")
            .with_item("accessToken", r#"{"value":"later"}"#);

        let creds = run(&config, page, &mut Messages::default()).unwrap();
        assert_eq!(creds.token.as_deref(), Some("raw-token"));

        let lookups: Vec<String> = log
            .borrow()
            .iter()
            .filter(|e| e.starts_with("get "))
            .cloned()
            .collect();
        assert_eq!(lookups, vec!["get userToken", "get token"]);
    }

    #[test]
    fn test_json_without_value_falls_through() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let log = Log::default();
        let page = FakePage::new(&log)
            .with_item("userToken", r#"{"other":"x"}"#)
            .with_item("auth_token", r#"{"value":"from-auth"}"#);

        let creds = run(&config, page, &mut Messages::default()).unwrap();
        assert_eq!(creds.token.as_deref(), Some("from-auth"));
    }

    #[test]
    fn test_lookup_error_skips_key() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let log = Log::default();
        let mut page = FakePage::new(&log)
            .with_item("userToken", r#"{"value":"unreachable"}"#)
            .with_item("token", "fallback");
        page.broken_keys = vec!["userToken"];

        let creds = run(&config, page, &mut Messages::default()).unwrap();
        assert_eq!(creds.token.as_deref(), Some("fallback"));
    }

    #[test]
    fn test_no_token_still_returns_cookies() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let log = Log::default();
        let page = FakePage::new(&log).with_item("userToken", "");
        let mut sink = Messages::default();

        let creds = run(&config, page, &mut sink).unwrap();
        assert!(creds.token.is_none());
        assert_eq!(creds.cookies.len(), 2);
        assert!(!config.storage.token_file.exists());
        assert!(config.storage.cookies_file.exists());
        assert!(sink.contains("Couldn't find token in localStorage"));
        assert_eq!(count(&log, "get accessToken"), 1);
    }

    #[test]
    fn test_storage_listing_failure_is_not_fatal() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let log = Log::default();
        let mut page = FakePage::new(&log).with_item("userToken", "tok");
        page.keys_fail = true;
        let mut sink = Messages::default();

        let creds = run(&config, page, &mut sink).unwrap();
        assert!(creds.token.is_none());
        assert!(sink.contains("Token extraction failed"));
        assert_eq!(count(&log, "close"), 1);
    }

    #[test]
    fn test_missing_field_aborts_and_closes() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let log = Log::default();
        let mut page = FakePage::new(&log);
        page.missing_selector = Some(password_selector());
        let mut sink = Messages::default();

        assert!(run(&config, page, &mut sink).is_none());
        assert_eq!(count(&log, "close"), 1);
        assert_eq!(count(&log, "click"), 0);
        assert!(!config.storage.cookies_file.exists());
        assert!(sink.contains("Login failed: Element not found"));
    }

    #[test]
    fn test_close_error_is_suppressed() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let log = Log::default();
        let mut page = FakePage::new(&log).with_item("token", "t");
        page.close_fails = true;

        let creds = run(&config, page, &mut Messages::default());
        assert!(creds.is_some());
        assert_eq!(count(&log, "close"), 1);
    }

    #[test]
    fn test_launch_failure() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let mut sink = Messages::default();

        let creds = CredentialExtractor::new(&config)
            .with_pacing(no_waits())
            .extract_with(
                || -> Result<FakePage> {
                    Err(BrowserError::Initialization("no chrome".to_string()))
                },
                &mut sink,
            );

        assert!(creds.is_none());
        assert!(sink.contains("Login failed: Browser initialization failed: no chrome"));
    }

    #[test]
    fn test_renavigates_when_redirected() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let log = Log::default();
        let mut page = FakePage::new(&log);
        page.url_after_first_nav = "https://chat.example.com/".to_string();
        let mut sink = Messages::default();

        run(&config, page, &mut sink).unwrap();
        assert_eq!(count(&log, "navigate https://chat.example.com/sign_in"), 2);
        assert!(sink.contains("Not on sign-in page, navigating..."));
    }

    #[test]
    fn test_token_from_raw() {
        assert_eq!(token_from_raw(r#"{"value":"abc"}"#).as_deref(), Some("abc"));
        assert_eq!(token_from_raw(r#"{"value":42}"#).as_deref(), Some("42"));
        assert_eq!(token_from_raw("plain.jwt.value").as_deref(), Some("plain.jwt.value"));
        assert_eq!(token_from_raw(r#"{"value":""}"#), None);
        assert_eq!(token_from_raw(r#""quoted""#), None);
        assert_eq!(token_from_raw("[1,2]"), None);
        assert_eq!(token_from_raw("null").as_deref(), Some("null"));
    }
}
