//! ds-session: DeepSeek chat session tool
//!
//! Usage:
//!   ds-session                    - Log in and save cookies + token
//!   ds-session --status           - Show saved session state
//!   ds-session --replay <file>    - Render a recorded reply stream
//!   ds-session --help             - Show help

mod replay;

use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use ds_browser::CredentialExtractor;
use ds_core::{Config, SessionCredentials, SessionState};
use ds_display::{Console, Severity};
use tracing_subscriber::EnvFilter;

/// Run mode
#[derive(Debug, PartialEq, Eq)]
enum RunMode {
    /// Scripted browser login
    Login,
    /// Show last login and saved files
    Status,
    /// Stream a JSON-lines fragment file through the live renderer
    Replay {
        path: PathBuf,
        thinking: bool,
        delay: Duration,
    },
    /// Show help
    Help,
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mode = match parse_args(std::env::args().skip(1)) {
        Ok(mode) => mode,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!();
            print_help();
            std::process::exit(2);
        }
    };

    match mode {
        RunMode::Help => {
            print_help();
            return Ok(());
        }
        RunMode::Version => {
            println!("ds-session {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        _ => {}
    }

    // Diagnostics go to stderr so they never tear the live panels
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    // Load .env file
    dotenvy::dotenv().ok();

    let config = Config::load().map_err(|e| anyhow::anyhow!("Config error: {}", e))?;

    match mode {
        RunMode::Login => run_login(config).await,
        RunMode::Status => run_status(&config),
        RunMode::Replay {
            path,
            thinking,
            delay,
        } => replay::run_replay(&config, &path, thinking, delay).await,
        RunMode::Help | RunMode::Version => Ok(()),
    }
}

/// Parse command line arguments (program name already skipped)
fn parse_args<I>(args: I) -> Result<RunMode, String>
where
    I: IntoIterator<Item = String>,
{
    let mut mode = None;
    let mut replay_path = None;
    let mut thinking = false;
    let mut delay = Duration::from_millis(replay::DEFAULT_DELAY_MS);

    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--help" | "-h" => return Ok(RunMode::Help),
            "--version" | "-v" => return Ok(RunMode::Version),
            "--login" | "-l" => mode = Some(RunMode::Login),
            "--status" | "-s" => mode = Some(RunMode::Status),
            "--replay" | "-r" => {
                let path = args
                    .next()
                    .ok_or_else(|| "--replay requires a file path".to_string())?;
                replay_path = Some(PathBuf::from(path));
            }
            "--thinking" | "-t" => thinking = true,
            "--delay" => {
                let ms = args
                    .next()
                    .ok_or_else(|| "--delay requires milliseconds".to_string())?;
                let ms: u64 = ms
                    .parse()
                    .map_err(|_| format!("invalid --delay value: {}", ms))?;
                delay = Duration::from_millis(ms);
            }
            other => return Err(format!("unknown argument: {}", other)),
        }
    }

    if let Some(path) = replay_path {
        if mode.is_some() {
            return Err("--replay cannot be combined with --login or --status".to_string());
        }
        return Ok(RunMode::Replay {
            path,
            thinking,
            delay,
        });
    }

    Ok(mode.unwrap_or(RunMode::Login))
}

/// Print help message
fn print_help() {
    println!("ds-session - DeepSeek chat session tool");
    println!();
    println!("Usage:");
    println!("  ds-session                     Log in and save cookies + token (default)");
    println!("  ds-session --login             Same as above");
    println!("  ds-session --status            Show last login and saved credential files");
    println!("  ds-session --replay <file>     Render a JSON-lines fragment file live");
    println!("      --thinking                 Show the thinking panel");
    println!("      --delay <ms>               Pause between fragments (default: {})", replay::DEFAULT_DELAY_MS);
    println!("  ds-session --help              Show this help message");
    println!("  ds-session --version           Show version");
    println!();
    println!("Environment Variables (also read from .env):");
    println!("  DEEPSEEK_EMAIL       Account email (required for login)");
    println!("  DEEPSEEK_PASSWORD    Account password (required for login)");
    println!("  BASE_URL             Site URL (default: https://chat.deepseek.com)");
    println!("  HEADLESS             Run the browser headless (default: true)");
    println!("  BROWSER_PATH         Chromium-based browser executable");
    println!("  ELEMENT_TIMEOUT      Seconds to wait for form fields (default: 10)");
    println!("  PAGE_LOAD_WAIT       Seconds to wait after navigation (default: 5)");
    println!("  AUTH_WAIT_TIME       Seconds to wait after submitting (default: 10)");
    println!("  COOKIES_FILE         Cookie output (default: cookies.json)");
    println!("  TOKEN_FILE           Token output (default: token.txt)");
    println!("  STATE_FILE           Session state (default: session_state.json)");
    println!("  REFRESH_PER_SECOND   Live redraw rate (default: 10)");
    println!("  RUST_LOG             Diagnostic log filter (default: warn)");
}

/// Log in and persist the captured credentials
async fn run_login(config: Config) -> anyhow::Result<()> {
    let mut console = Console::stdout();

    if !config.has_account() {
        console.print_status("No email/password in .env file!", Severity::Error);
        std::process::exit(1);
    }

    tracing::info!("Logging in at {}", config.sign_in_url());

    // headless_chrome blocks, keep it off the runtime threads
    let credentials = tokio::task::spawn_blocking(move || {
        let mut console = Console::stdout();
        CredentialExtractor::new(&config).extract_credentials(&mut console)
    })
    .await?;

    match credentials {
        Some(creds) if !creds.cookies.is_empty() && creds.token.is_some() => {
            console.print_status("Authentication successful!", Severity::Success);
            Ok(())
        }
        _ => {
            console.print_status("Authentication failed!", Severity::Error);
            std::process::exit(1);
        }
    }
}

/// Report last login time and saved credential files
fn run_status(config: &Config) -> anyhow::Result<()> {
    let mut console = Console::stdout();
    let storage = &config.storage;

    let state = SessionState::load(&storage.state_file)?;
    match (state.last_login, state.login_age(Utc::now())) {
        (Some(at), Some(age)) => console.print_status(
            &format!(
                "Last login: {} ({})",
                at.format("%Y-%m-%d %H:%M:%S UTC"),
                format_age(age)
            ),
            Severity::Info,
        ),
        _ => console.print_status("No recorded login", Severity::Progress),
    }

    if !storage.cookies_file.exists() {
        console.print_status(
            &format!("No cookie file at {}", storage.cookies_file.display()),
            Severity::Error,
        );
        return Ok(());
    }

    let creds = SessionCredentials::load(&storage.cookies_file, &storage.token_file)?;
    console.print_status(
        &format!(
            "{} cookies in {}",
            creds.cookies.len(),
            storage.cookies_file.display()
        ),
        Severity::Info,
    );

    match creds.session_id() {
        Some(_) => console.print_status("Session ID present", Severity::Success),
        None => console.print_status("No session ID found", Severity::Error),
    }

    match &creds.token {
        Some(_) => console.print_status(
            &format!("Token saved in {}", storage.token_file.display()),
            Severity::Success,
        ),
        None => console.print_status("No token saved", Severity::Error),
    }

    Ok(())
}

fn format_age(age: chrono::Duration) -> String {
    let minutes = age.num_minutes().max(0);
    match minutes {
        0 => "just now".to_string(),
        m if m < 60 => format!("{}m ago", m),
        m if m < 60 * 24 => format!("{}h {}m ago", m / 60, m % 60),
        m => format!("{}d ago", m / (60 * 24)),
    }
}
