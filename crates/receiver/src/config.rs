use clap::Parser;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::tracker::DEFAULT_API_URL;
use crate::{Error, Result};

const USAGE: &str = "\
github-receiver receives Alertmanager webhook notifications and creates
corresponding issues on GitHub.

The receiver authenticates all actions using the given --authtoken or the
value read from --authtoken-file. The given --org and --repo names are used
as the default destination for new issues.

EXAMPLE
  github-receiver --org <name> --repo <repo> --authtoken <token>";

/// Command line flags. Every flag can also be supplied through the
/// environment (or a `.env` file).
#[derive(Debug, Clone, Parser)]
#[command(name = "github-receiver", version, about, long_about = USAGE)]
pub struct Args {
    /// OAuth2 token for access to the GitHub API.
    #[arg(long, env = "AUTHTOKEN", hide_env_values = true)]
    pub authtoken: Option<String>,

    /// File containing the OAuth2 token. Takes precedence over --authtoken.
    #[arg(long = "authtoken-file", env = "AUTHTOKEN_FILE")]
    pub authtoken_file: Option<PathBuf>,

    /// The GitHub user or organization name where all repos are found.
    #[arg(long, env = "ORG")]
    pub org: Option<String>,

    /// The default repository for creating issues when alerts do not include a repo label.
    #[arg(long, env = "REPO")]
    pub repo: Option<String>,

    /// Once an alert stops firing, automatically close open issues.
    #[arg(long = "enable-auto-close", env = "ENABLE_AUTO_CLOSE")]
    pub enable_auto_close: bool,

    /// Perform all operations in memory, without using the GitHub API.
    #[arg(long = "enable-inmemory", env = "ENABLE_INMEMORY")]
    pub enable_inmemory: bool,

    /// Listen address for Alertmanager webhook notifications.
    #[arg(
        long = "webhook.listen-address",
        env = "WEBHOOK_LISTEN_ADDRESS",
        default_value = "0.0.0.0:9393"
    )]
    pub listen_address: String,

    /// Label applied to all alert issues. Also used to search for existing alerts.
    #[arg(long = "alertlabel", env = "ALERTLABEL", default_value = "alert:boom:")]
    pub alert_label: String,

    /// Label applied to issues whose alert has resolved.
    #[arg(long = "resolved-label", env = "RESOLVED_LABEL", default_value = "alert:resolved")]
    pub resolved_label: String,

    /// Extra labels to add to issues at creation time.
    #[arg(long = "label", env = "LABEL", value_delimiter = ',')]
    pub labels: Vec<String>,

    /// File(s) containing a template to generate issue titles. The first file
    /// is the title; the rest may be included by it.
    #[arg(long = "title-template-files", env = "TITLE_TEMPLATE_FILES", value_delimiter = ',')]
    pub title_template_files: Vec<PathBuf>,

    /// File containing a template to generate issue bodies.
    #[arg(long = "alert-template-file", env = "ALERT_TEMPLATE_FILE")]
    pub alert_template_file: Option<PathBuf>,

    /// Timeout for each GitHub API call, in seconds.
    #[arg(long = "tracker-timeout-secs", env = "TRACKER_TIMEOUT_SECS", default_value_t = 15)]
    pub tracker_timeout_secs: u64,

    /// Base URL of the GitHub API.
    #[arg(long = "github-api-url", env = "GITHUB_API_URL", default_value = DEFAULT_API_URL)]
    pub github_api_url: String,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum TrackerKind {
    #[serde(rename = "github")]
    GitHub,
    #[serde(rename = "memory")]
    Memory,
}

#[derive(Debug, Clone, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    pub receiver: ReceiverConfig,
    pub tracker: TrackerConfig,
    pub templates: TemplateConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServerConfig {
    pub addr: String,
}

/// Settings consumed by the reconciliation engine.
#[derive(Debug, Clone, Serialize)]
pub struct ReceiverConfig {
    /// Repository for alerts without a "repo" label. Must exist.
    pub default_repo: String,
    /// Close matching issues when their alert resolves.
    pub auto_close: bool,
    /// Applied when an alert resolves, removed when it fires again.
    pub resolved_label: String,
    /// Added to every new issue.
    pub extra_labels: Vec<String>,
}

#[derive(Clone, Serialize)]
pub struct TrackerConfig {
    pub kind: TrackerKind,
    pub owner: String,
    #[serde(skip_serializing)]
    pub token: String,
    pub alert_label: String,
    pub api_url: String,
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
}

// The token never shows up in logs.
impl fmt::Debug for TrackerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = if self.token.is_empty() { "" } else { "<redacted>" };
        f.debug_struct("TrackerConfig")
            .field("kind", &self.kind)
            .field("owner", &self.owner)
            .field("token", &token)
            .field("alert_label", &self.alert_label)
            .field("api_url", &self.api_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TemplateConfig {
    pub title_files: Vec<PathBuf>,
    pub body_file: Option<PathBuf>,
}

mod duration_secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        // Load environment variables from .env file if it exists
        let _ = dotenvy::dotenv();
        Self::from_args(Args::parse())
    }

    pub fn from_args(args: Args) -> Result<Self> {
        let owner = args
            .org
            .filter(|org| !org.is_empty())
            .ok_or_else(|| Error::Config("--org must be set".to_string()))?;
        let default_repo = args
            .repo
            .filter(|repo| !repo.is_empty())
            .ok_or_else(|| Error::Config("--repo must be set".to_string()))?;

        let token = match &args.authtoken_file {
            Some(path) => std::fs::read_to_string(path)
                .map_err(|e| {
                    Error::Config(format!("failed to read {}: {}", path.display(), e))
                })?
                .trim()
                .to_string(),
            None => args.authtoken.unwrap_or_default(),
        };

        let kind = if args.enable_inmemory {
            TrackerKind::Memory
        } else {
            TrackerKind::GitHub
        };
        if kind == TrackerKind::GitHub && token.is_empty() {
            return Err(Error::Config(
                "--authtoken or --authtoken-file must be set".to_string(),
            ));
        }

        if args.resolved_label.is_empty() {
            tracing::warn!("Resolved label is empty; issues will not be labeled on resolve.");
        }

        Ok(Config {
            server: ServerConfig {
                addr: args.listen_address,
            },
            receiver: ReceiverConfig {
                default_repo,
                auto_close: args.enable_auto_close,
                resolved_label: args.resolved_label,
                extra_labels: args.labels.into_iter().filter(|l| !l.is_empty()).collect(),
            },
            tracker: TrackerConfig {
                kind,
                owner,
                token,
                alert_label: args.alert_label,
                api_url: args.github_api_url,
                timeout: Duration::from_secs(args.tracker_timeout_secs),
            },
            templates: TemplateConfig {
                title_files: args.title_template_files,
                body_file: args.alert_template_file,
            },
        })
    }
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            default_repo: "default".to_string(),
            auto_close: false,
            resolved_label: "alert:resolved".to_string(),
            extra_labels: Vec::new(),
        }
    }
}
