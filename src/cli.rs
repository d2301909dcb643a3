use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use log::info;
use std::path::PathBuf;

use crate::auth::Credentials;
use crate::config::Config;
use crate::error::JenLensError;
use crate::output;
use crate::providers::JenkinsProvider;

#[derive(Parser)]
#[command(name = "jenlens")]
#[command(author, version, about = "Jenkins build inspection tool", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    connection: ConnectionArgs,

    /// Write JSON output to this file instead of stdout
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// Emit JSON instead of the human summary
    #[arg(short, long, global = true, default_value_t = false)]
    json: bool,

    /// Pretty-print JSON output
    #[arg(short, long, global = true, default_value_t = false)]
    pretty: bool,

    /// Explicit config file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Args)]
struct ConnectionArgs {
    /// Jenkins base URL
    #[arg(short, long, global = true, env = "JENKINS_URL")]
    url: Option<String>,

    /// Username for API authentication
    #[arg(short = 'U', long, global = true, env = "JENKINS_USER")]
    user: Option<String>,

    /// Jenkins API token
    #[arg(short, long, global = true, env = "JENKINS_TOKEN", hide_env_values = true)]
    token: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the step-by-step status of one build
    Status {
        /// Build locator: a job URL, run URL, or path like pipelines/NAME/42
        locator: String,
    },

    /// List the failed steps of a build
    Failures {
        /// Build locator: a job URL, run URL, or path like pipelines/NAME/42
        locator: String,

        /// Follow trigger links into sub-builds
        #[arg(short, long, default_value_t = false)]
        recursive: bool,

        /// Attach each failed step's console text
        #[arg(short = 'C', long, default_value_t = false)]
        console: bool,
    },

    /// Print one step's console text
    Log {
        /// Blue Ocean step URL
        step_url: String,
    },

    /// List recent runs of a pipeline
    Builds {
        /// Job locator: a job URL or path like pipelines/NAME
        locator: String,

        /// Maximum number of runs to list
        #[arg(short, long)]
        limit: Option<usize>,
    },
}

impl Cli {
    pub async fn execute(&self) -> Result<()> {
        let config = Config::load(self.config.as_deref())?;
        let provider = self.provider(&config)?;

        match &self.command {
            Commands::Status { locator } => {
                let status = provider.build_status(locator).await?;
                if self.wants_json(&config) {
                    self.emit_json(&status, &config)?;
                } else {
                    output::print_build_status(&status);
                }
            }
            Commands::Failures {
                locator,
                recursive,
                console,
            } => {
                let report = provider.failure_report(locator, *recursive, *console).await?;
                if self.wants_json(&config) {
                    self.emit_json(&report, &config)?;
                } else {
                    output::print_failure_report(&report);
                }
            }
            Commands::Log { step_url } => {
                let text = provider.console_text(step_url).await?;
                match &self.output {
                    Some(path) => {
                        std::fs::write(path, &text)?;
                        info!("Console text written to: {}", path.display());
                    }
                    None => print!("{text}"),
                }
            }
            Commands::Builds { locator, limit } => {
                let limit = limit.unwrap_or(config.jenkins.limit);
                let listing = provider.recent_builds(locator, limit).await?;
                if self.wants_json(&config) {
                    self.emit_json(&listing, &config)?;
                } else {
                    output::print_build_listing(&listing);
                }
            }
        }

        Ok(())
    }

    fn provider(&self, config: &Config) -> Result<JenkinsProvider> {
        let url = self
            .connection
            .url
            .clone()
            .or_else(|| config.jenkins.url.clone())
            .ok_or_else(|| {
                JenLensError::Config(
                    "No Jenkins URL configured: pass --url, set JENKINS_URL, or add it to jenlens.toml"
                        .to_string(),
                )
            })?;

        let user = self
            .connection
            .user
            .clone()
            .or_else(|| config.jenkins.user.clone());
        let token = self
            .connection
            .token
            .clone()
            .or_else(|| config.jenkins.token.clone());

        let credentials = match (user, token) {
            (Some(user), Some(token)) => Some(Credentials::new(user, token)),
            (None, None) => None,
            _ => {
                return Err(JenLensError::Config(
                    "Authentication needs both a user and an API token".to_string(),
                )
                .into())
            }
        };

        Ok(JenkinsProvider::new(&url, credentials)?)
    }

    fn wants_json(&self, config: &Config) -> bool {
        self.json || config.output.json || self.output.is_some()
    }

    fn emit_json<T: serde::Serialize>(&self, value: &T, config: &Config) -> crate::error::Result<()> {
        let json_output = if self.pretty || config.output.pretty {
            serde_json::to_string_pretty(value)?
        } else {
            serde_json::to_string(value)?
        };

        if let Some(output_path) = &self.output {
            std::fs::write(output_path, json_output)?;
            info!("Report written to: {}", output_path.display());
        } else {
            println!("{}", json_output);
        }

        Ok(())
    }
}
