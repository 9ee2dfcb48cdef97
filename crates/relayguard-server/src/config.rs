//! Server configuration: TOML file + CLI overrides, plus allow-set persistence.
//!
//! The config file doubles as the backing store for the token allow-set:
//! `allowed-tokens` is read once at startup and rewritten whenever a first-run
//! auto-learn occurs.

use crate::extract::HandshakeFormat;
use relayguard_core::{translate_color_codes, GuardError, GuardResult, KickMessages};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Top-level config file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub messages: MessagesSection,
    #[serde(default)]
    pub tokens: TokensSection,
}

/// `[server]` section of the config TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ServerSection {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_format")]
    pub handshake_format: HandshakeFormat,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            handshake_format: default_format(),
        }
    }
}

/// `[messages]` section: kick text per reject reason.
///
/// Messages may use `&`-style formatting codes; they are translated to the
/// legacy `§` form at load time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MessagesSection {
    #[serde(default = "default_no_data")]
    pub no_data_kick_message: String,
    #[serde(default = "default_no_properties")]
    pub no_properties_kick_message: String,
    #[serde(default = "default_invalid_token")]
    pub invalid_token_kick_message: String,
    #[serde(default = "default_already_online")]
    pub already_online_kick_message: String,
    #[serde(default = "default_internal_error")]
    pub internal_error_kick_message: String,
}

impl Default for MessagesSection {
    fn default() -> Self {
        Self {
            no_data_kick_message: default_no_data(),
            no_properties_kick_message: default_no_properties(),
            invalid_token_kick_message: default_invalid_token(),
            already_online_kick_message: default_already_online(),
            internal_error_kick_message: default_internal_error(),
        }
    }
}

/// `[tokens]` section: the persisted allow-set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TokensSection {
    #[serde(default)]
    pub allowed_tokens: Vec<String>,
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    25566
}
fn default_format() -> HandshakeFormat {
    HandshakeFormat::Bungee
}
fn default_no_data() -> String {
    "&cUnable to authenticate - no token was forwarded by the proxy.".to_string()
}
fn default_no_properties() -> String {
    "&cDirect connections to this server are not allowed.".to_string()
}
fn default_invalid_token() -> String {
    "&cUnable to authenticate - the forwarded token was not valid.".to_string()
}
fn default_already_online() -> String {
    "You have already in proxy.".to_string()
}
fn default_internal_error() -> String {
    "&cUnable to authenticate.".to_string()
}

/// Callback that writes the allow-set back to its backing store.
pub type PersistFn = Box<dyn Fn(&[String]) -> GuardResult<()> + Send + Sync>;

/// Resolved server configuration (paths expanded, CLI overrides applied,
/// kick messages translated).
#[derive(Debug, Clone)]
pub struct GuardConfig {
    pub bind: String,
    pub port: u16,
    pub format: HandshakeFormat,
    pub messages: KickMessages,
    pub allowed_tokens: Vec<String>,
    pub config_path: PathBuf,
}

impl GuardConfig {
    /// Load config from the TOML file, then apply CLI overrides.
    ///
    /// If the file does not exist a default one is written first, so a fresh
    /// install always has a config the operator can edit.
    pub fn load(
        config_path: &Path,
        cli_port: Option<u16>,
        cli_bind: Option<&str>,
        cli_format: Option<HandshakeFormat>,
    ) -> GuardResult<Self> {
        let expanded = expand_tilde(config_path);

        let file_config = if expanded.exists() {
            info!(path = %expanded.display(), "loading config file");
            let content = std::fs::read_to_string(&expanded)?;
            toml::from_str::<ConfigFile>(&content)
                .map_err(|e| GuardError::Config(format!("config parse error: {e}")))?
        } else {
            info!(path = %expanded.display(), "config file not found, writing defaults");
            let defaults = ConfigFile::default();
            write_config(&expanded, &defaults)?;
            defaults
        };

        let messages = KickMessages {
            no_properties: translate_color_codes(&file_config.messages.no_properties_kick_message),
            no_token: translate_color_codes(&file_config.messages.no_data_kick_message),
            invalid_token: translate_color_codes(&file_config.messages.invalid_token_kick_message),
            already_online: translate_color_codes(
                &file_config.messages.already_online_kick_message,
            ),
            internal_error: translate_color_codes(
                &file_config.messages.internal_error_kick_message,
            ),
        };

        Ok(Self {
            bind: cli_bind
                .map(|s| s.to_string())
                .unwrap_or(file_config.server.bind),
            port: cli_port.unwrap_or(file_config.server.port),
            format: cli_format.unwrap_or(file_config.server.handshake_format),
            messages,
            allowed_tokens: file_config.tokens.allowed_tokens,
            config_path: expanded,
        })
    }

    /// Persistence callback for the token store, bound to this config file.
    pub fn token_persister(&self) -> PersistFn {
        let path = self.config_path.clone();
        Box::new(move |tokens: &[String]| persist_tokens(&path, tokens))
    }
}

/// Rewrite `allowed-tokens` in the config file, preserving everything else.
///
/// The file is re-read first so operator edits made since startup are not
/// clobbered.
fn persist_tokens(path: &Path, tokens: &[String]) -> GuardResult<()> {
    let mut file = match std::fs::read_to_string(path) {
        Ok(content) => toml::from_str::<ConfigFile>(&content)
            .map_err(|e| GuardError::Persistence(format!("config reparse failed: {e}")))?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => ConfigFile::default(),
        Err(e) => {
            return Err(GuardError::Persistence(format!(
                "cannot read {}: {e}",
                path.display()
            )))
        }
    };

    let mut listed = tokens.to_vec();
    listed.sort();
    file.tokens.allowed_tokens = listed;
    write_config(path, &file)
}

fn write_config(path: &Path, config: &ConfigFile) -> GuardResult<()> {
    let rendered = toml::to_string_pretty(config)
        .map_err(|e| GuardError::Persistence(format!("config serialize failed: {e}")))?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            GuardError::Persistence(format!("cannot create {}: {e}", parent.display()))
        })?;
    }
    std::fs::write(path, rendered)
        .map_err(|e| GuardError::Persistence(format!("cannot write {}: {e}", path.display())))
}

/// Expand `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    if let Some(rest) = s.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(s.as_ref())
}
