//! Configuration management
//!
//! 設定は以下の優先順位で読み込まれます:
//! 1. 環境変数 (`.env` はバイナリ側で dotenvy により読み込み)
//! 2. ds-session.toml 設定ファイル
//! 3. デフォルト値
//!
//! 設定ファイル内では `${VAR_NAME}` 形式で環境変数を展開できます。

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{Error, Result};

/// Default configuration file name, looked up in the working directory
pub const CONFIG_FILE: &str = "ds-session.toml";

/// Account credentials used to fill the sign-in form
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountConfig {
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
}

/// Target site
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Base URL of the chat site, without trailing slash
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

/// Browser launch and pacing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Whether to run in headless mode
    #[serde(default = "default_headless")]
    pub headless: bool,
    /// Path to a Chromium-based browser; the system Chrome is used when unset
    pub executable_path: Option<String>,
    /// Element wait timeout in seconds
    #[serde(default = "default_element_timeout")]
    pub element_timeout: u64,
    /// Fixed pause after each navigation, in seconds
    #[serde(default = "default_page_load_wait")]
    pub page_load_wait: u64,
    /// Fixed pause after submitting the login form, in seconds
    #[serde(default = "default_auth_wait")]
    pub auth_wait: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            executable_path: None,
            element_timeout: default_element_timeout(),
            page_load_wait: default_page_load_wait(),
            auth_wait: default_auth_wait(),
        }
    }
}

impl BrowserConfig {
    pub fn element_timeout(&self) -> Duration {
        Duration::from_secs(self.element_timeout)
    }

    pub fn page_load_wait(&self) -> Duration {
        Duration::from_secs(self.page_load_wait)
    }

    pub fn auth_wait(&self) -> Duration {
        Duration::from_secs(self.auth_wait)
    }
}

/// Where extracted credentials and session state are written
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_cookies_file")]
    pub cookies_file: PathBuf,
    #[serde(default = "default_token_file")]
    pub token_file: PathBuf,
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            cookies_file: default_cookies_file(),
            token_file: default_token_file(),
            state_file: default_state_file(),
        }
    }
}

/// Live rendering settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    #[serde(default = "default_refresh_per_second")]
    pub refresh_per_second: u32,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            refresh_per_second: default_refresh_per_second(),
        }
    }
}

/// Main configuration for ds-session
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub account: AccountConfig,
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub display: DisplayConfig,
}

fn default_base_url() -> String {
    "https://chat.deepseek.com".to_string()
}

fn default_headless() -> bool {
    true
}

fn default_element_timeout() -> u64 {
    10
}

fn default_page_load_wait() -> u64 {
    5
}

fn default_auth_wait() -> u64 {
    10
}

fn default_cookies_file() -> PathBuf {
    PathBuf::from("cookies.json")
}

fn default_token_file() -> PathBuf {
    PathBuf::from("token.txt")
}

fn default_state_file() -> PathBuf {
    PathBuf::from("session_state.json")
}

fn default_refresh_per_second() -> u32 {
    10
}

impl Config {
    /// 設定ファイルから環境変数を展開する
    ///
    /// `${VAR_NAME}` 形式の文字列を環境変数の値に置換します。
    /// 環境変数が存在しない場合は空文字列になります。
    fn expand_env_vars(value: &str) -> String {
        let mut result = String::with_capacity(value.len());
        let mut chars = value.chars().peekable();

        while let Some(c) = chars.next() {
            if c == '$' && chars.peek() == Some(&'{') {
                chars.next(); // '{' を消費

                let mut var_name = String::new();
                while let Some(c) = chars.next_if(|&c| c != '}') {
                    var_name.push(c);
                }
                chars.next(); // '}' を消費

                if let Ok(env_value) = std::env::var(&var_name) {
                    result.push_str(&env_value);
                }
            } else {
                result.push(c);
            }
        }

        result
    }

    /// TOML 設定ファイルから設定を読み込む
    ///
    /// 環境変数による上書きも適用されます。
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let toml_content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

        let mut cfg = Self::from_toml_str(&toml_content)?;
        cfg.apply_env_overrides();

        Ok(cfg)
    }

    /// TOML 文字列を解析する (環境変数の上書きなし)
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let expanded = Self::expand_env_vars(content);

        toml::from_str(&expanded)
            .map_err(|e| Error::Config(format!("Failed to parse TOML: {}", e)))
    }

    /// デフォルトパスから設定を読み込む
    ///
    /// `./ds-session.toml` があればそれを使い、なければ環境変数のみ。
    pub fn load() -> Result<Self> {
        if Path::new(CONFIG_FILE).exists() {
            tracing::debug!("Loading configuration from {}", CONFIG_FILE);
            return Self::from_toml_file(CONFIG_FILE);
        }

        Ok(Self::from_env())
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        cfg.apply_env_overrides();
        cfg
    }

    /// 環境変数で設定を上書きする
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        // 空文字列は未設定として扱う
        let var = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(email) = var("DEEPSEEK_EMAIL") {
            self.account.email = email;
        }
        if let Some(password) = var("DEEPSEEK_PASSWORD") {
            self.account.password = password;
        }

        if let Some(url) = var("BASE_URL") {
            self.site.base_url = url.trim_end_matches('/').to_string();
        }

        if let Some(headless) = var("HEADLESS") {
            self.browser.headless = parse_bool(&headless);
        }
        if let Some(path) = var("BROWSER_PATH") {
            self.browser.executable_path = Some(path);
        }
        if let Some(secs) = var("ELEMENT_TIMEOUT").and_then(|v| v.parse().ok()) {
            self.browser.element_timeout = secs;
        }
        if let Some(secs) = var("PAGE_LOAD_WAIT").and_then(|v| v.parse().ok()) {
            self.browser.page_load_wait = secs;
        }
        if let Some(secs) = var("AUTH_WAIT_TIME").and_then(|v| v.parse().ok()) {
            self.browser.auth_wait = secs;
        }

        if let Some(path) = var("COOKIES_FILE") {
            self.storage.cookies_file = PathBuf::from(path);
        }
        if let Some(path) = var("TOKEN_FILE") {
            self.storage.token_file = PathBuf::from(path);
        }
        if let Some(path) = var("STATE_FILE") {
            self.storage.state_file = PathBuf::from(path);
        }

        if let Some(rate) = var("REFRESH_PER_SECOND").and_then(|v| v.parse().ok()) {
            self.display.refresh_per_second = rate;
        }
    }

    /// Whether both email and password are set
    pub fn has_account(&self) -> bool {
        !self.account.email.is_empty() && !self.account.password.is_empty()
    }

    /// Sign-in page URL
    pub fn sign_in_url(&self) -> String {
        format!("{}/sign_in", self.site.base_url.trim_end_matches('/'))
    }
}

fn parse_bool(value: &str) -> bool {
    !matches!(
        value.trim().to_lowercase().as_str(),
        "false" | "0" | "no" | "off"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.site.base_url, "https://chat.deepseek.com");
        assert!(config.browser.headless);
        assert_eq!(config.browser.element_timeout, 10);
        assert_eq!(config.browser.page_load_wait, 5);
        assert_eq!(config.storage.cookies_file, PathBuf::from("cookies.json"));
        assert_eq!(config.storage.token_file, PathBuf::from("token.txt"));
        assert_eq!(config.display.refresh_per_second, 10);
        assert!(!config.has_account());
    }

    #[test]
    fn test_sign_in_url() {
        let mut config = Config::default();
        assert_eq!(config.sign_in_url(), "https://chat.deepseek.com/sign_in");

        config.site.base_url = "http://localhost:8080/".to_string();
        assert_eq!(config.sign_in_url(), "http://localhost:8080/sign_in");
    }

    #[test]
    fn test_expand_env_vars() {
        unsafe {
            std::env::set_var("DS_SESSION_TEST_VAR", "test_value");
        }

        let result = Config::expand_env_vars("prefix_${DS_SESSION_TEST_VAR}_suffix");
        assert_eq!(result, "prefix_test_value_suffix");

        let result = Config::expand_env_vars("prefix_${DS_SESSION_NONEXISTENT}_suffix");
        assert_eq!(result, "prefix__suffix");

        unsafe {
            std::env::remove_var("DS_SESSION_TEST_VAR");
        }
    }

    #[test]
    fn test_expand_env_vars_edge_cases() {
        assert_eq!(Config::expand_env_vars("no_vars_here"), "no_vars_here");
        assert_eq!(Config::expand_env_vars("${}_content"), "_content");
        assert_eq!(Config::expand_env_vars("cost $5"), "cost $5");
    }

    #[test]
    fn test_toml_config_parsing() {
        let toml_content = r#"
[account]
email = "user@example.com"
password = "hunter2"

[site]
base_url = "https://chat.example.com"

[browser]
headless = false
executable_path = "/usr/bin/brave-browser"
element_timeout = 20
auth_wait = 15

[storage]
cookies_file = "/tmp/cookies.json"
token_file = "/tmp/token.txt"

[display]
refresh_per_second = 4
"#;

        let config = Config::from_toml_str(toml_content).unwrap();
        assert!(config.has_account());
        assert_eq!(config.account.email, "user@example.com");
        assert_eq!(config.site.base_url, "https://chat.example.com");
        assert!(!config.browser.headless);
        assert_eq!(
            config.browser.executable_path.as_deref(),
            Some("/usr/bin/brave-browser")
        );
        assert_eq!(config.browser.element_timeout(), Duration::from_secs(20));
        assert_eq!(config.browser.auth_wait(), Duration::from_secs(15));
        // 未指定の項目はデフォルト値
        assert_eq!(config.browser.page_load_wait, 5);
        assert_eq!(config.storage.cookies_file, PathBuf::from("/tmp/cookies.json"));
        assert_eq!(config.storage.state_file, PathBuf::from("session_state.json"));
        assert_eq!(config.display.refresh_per_second, 4);
    }

    #[test]
    fn test_toml_config_invalid() {
        let err = Config::from_toml_str("[browser]\nheadless = \"maybe\"").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("DEEPSEEK_EMAIL", "env@example.com"),
            ("DEEPSEEK_PASSWORD", "secret"),
            ("HEADLESS", "false"),
            ("AUTH_WAIT_TIME", "30"),
            ("ELEMENT_TIMEOUT", "not-a-number"),
            ("TOKEN_FILE", ""),
            ("BASE_URL", "https://mirror.example.com/"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert!(config.has_account());
        assert_eq!(config.account.email, "env@example.com");
        assert!(!config.browser.headless);
        assert_eq!(config.browser.auth_wait, 30);
        // 数値として解釈できない値は無視
        assert_eq!(config.browser.element_timeout, 10);
        // 空文字列は未設定扱い
        assert_eq!(config.storage.token_file, PathBuf::from("token.txt"));
        assert_eq!(config.site.base_url, "https://mirror.example.com");
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("true"));
        assert!(parse_bool("1"));
        assert!(parse_bool("TRUE"));
        assert!(!parse_bool("false"));
        assert!(!parse_bool(" Off "));
        assert!(!parse_bool("0"));
    }
}
