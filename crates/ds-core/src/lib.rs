//! ds-core: shared types for ds-session
//!
//! 設定、セッション認証情報、チャットフラグメント、
//! ログイン状態の永続化を提供します。

pub mod config;
pub mod credentials;
pub mod error;
pub mod fragment;
pub mod state;

pub use config::{AccountConfig, BrowserConfig, Config, DisplayConfig, SiteConfig, StorageConfig};
pub use credentials::{SessionCredentials, preview};
pub use error::{Error, Result};
pub use fragment::{ChatFragment, FragmentKind, read_fragments};
pub use state::SessionState;
