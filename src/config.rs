//! Optional configuration file for gogit.
//!
//! Values given on the command line (or through their environment variables)
//! win; the file fills in whatever was left out; built-in defaults cover the rest.
//!
//! # Configuration File Format
//!
//! ```toml
//! [provider]
//! kind = "gitlab"
//! server = "https://gitlab.example.com"
//! username = "ci-bot"
//! token = "file:///var/run/secrets/gitlab/token"
//! timeout = 30
//!
//! [plugin]
//! target = "https://argo.example.com"
//! port = 3001
//! create_comment = true
//! comment_identity = "<!-- gogit -->"
//! retry_interval = 2
//! retry_timeout = 20
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::argo::PluginOptions;
use crate::credentials::resolve_token;
use crate::reconcile::DEFAULT_COMMENT_MARKER;
use crate::retry::RetryPolicy;
use crate::scm::{Provider, ScmOptions};

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Hosting provider connection defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderSection {
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub server: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    /// Literal token or `file://` reference
    #[serde(default)]
    pub token: Option<String>,
    /// HTTP timeout in seconds
    #[serde(default)]
    pub timeout: Option<u64>,
}

/// Executor plugin server defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PluginSection {
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub kubeconfig: Option<PathBuf>,
    #[serde(default)]
    pub create_comment: Option<bool>,
    #[serde(default)]
    pub comment_template: Option<String>,
    #[serde(default)]
    pub comment_identity: Option<String>,
    #[serde(default)]
    pub retry_interval: Option<u64>,
    #[serde(default)]
    pub retry_timeout: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GogitToml {
    #[serde(default)]
    pub provider: ProviderSection,
    #[serde(default)]
    pub plugin: PluginSection,
}

/// Provider flags as given on the command line; `None` means "not given".
#[derive(Debug, Clone, Default)]
pub struct ProviderFlags {
    pub provider: Option<Provider>,
    pub server: Option<String>,
    pub username: Option<String>,
    pub token: Option<String>,
    pub timeout: Option<u64>,
}

/// Plugin flags as given on the command line; `None` means "not given".
#[derive(Debug, Clone, Default)]
pub struct PluginFlags {
    pub target: Option<String>,
    pub port: Option<u16>,
    pub kubeconfig: Option<PathBuf>,
    pub create_comment: Option<bool>,
    pub comment_template: Option<String>,
    pub comment_identity: Option<String>,
    pub retry_interval: Option<u64>,
    pub retry_timeout: Option<u64>,
}

/// Fully layered provider settings.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub scm: ScmOptions,
    pub username: String,
}

/// Fully layered plugin server settings.
#[derive(Debug, Clone)]
pub struct PluginSettings {
    pub port: u16,
    pub kubeconfig: Option<PathBuf>,
    pub options: PluginOptions,
}

impl GogitToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid config file: {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse gogit config")
    }

    /// Load `path` when given, otherwise `<config dir>/gogit/config.toml` if it exists.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match default_path() {
            Some(path) if path.exists() => {
                tracing::debug!(path = %path.display(), "loading config file");
                Self::load(&path)
            }
            _ => Ok(Self::default()),
        }
    }

    pub fn provider_settings(&self, flags: ProviderFlags) -> Result<ProviderSettings> {
        let file = &self.provider;
        let provider = match flags.provider {
            Some(p) => p,
            None => match &file.kind {
                Some(kind) => kind.parse()?,
                None => Provider::default(),
            },
        };
        let token = flags.token.or_else(|| file.token.clone()).unwrap_or_default();
        let timeout = flags.timeout.or(file.timeout).unwrap_or(DEFAULT_TIMEOUT_SECS);
        Ok(ProviderSettings {
            scm: ScmOptions {
                provider,
                server: flags.server.or_else(|| file.server.clone()),
                token: resolve_token(&token)?,
                timeout: Duration::from_secs(timeout),
            },
            username: flags.username.or_else(|| file.username.clone()).unwrap_or_default(),
        })
    }

    /// Layer plugin flags over the file. The token stays unresolved here; each
    /// request resolves it, so a rotated `file://` token is picked up.
    pub fn plugin_settings(
        &self,
        provider: ProviderFlags,
        flags: PluginFlags,
    ) -> Result<PluginSettings> {
        let file = &self.plugin;
        let kind = match provider.provider {
            Some(p) => p,
            None => match &self.provider.kind {
                Some(kind) => kind.parse()?,
                None => Provider::default(),
            },
        };
        let defaults = PluginOptions::default();
        let retry = RetryPolicy {
            interval: flags
                .retry_interval
                .or(file.retry_interval)
                .map(Duration::from_secs)
                .unwrap_or(defaults.retry.interval),
            timeout: flags
                .retry_timeout
                .or(file.retry_timeout)
                .map(Duration::from_secs)
                .unwrap_or(defaults.retry.timeout),
        };
        let options = PluginOptions {
            provider: kind,
            server: provider.server.or_else(|| self.provider.server.clone()),
            username: provider
                .username
                .or_else(|| self.provider.username.clone())
                .unwrap_or_default(),
            token: provider
                .token
                .or_else(|| self.provider.token.clone())
                .unwrap_or_default(),
            target: flags
                .target
                .or_else(|| file.target.clone())
                .unwrap_or(defaults.target),
            timeout: provider
                .timeout
                .or(self.provider.timeout)
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            create_comment: flags
                .create_comment
                .or(file.create_comment)
                .unwrap_or(defaults.create_comment),
            comment_template: flags
                .comment_template
                .or_else(|| file.comment_template.clone()),
            comment_identity: flags
                .comment_identity
                .or_else(|| file.comment_identity.clone())
                .unwrap_or_else(|| DEFAULT_COMMENT_MARKER.to_string()),
            retry,
        };
        Ok(PluginSettings {
            port: flags.port.or(file.port).unwrap_or(3001),
            kubeconfig: flags.kubeconfig.or_else(|| file.kubeconfig.clone()),
            options,
        })
    }
}

pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("gogit").join("config.toml"))
}
