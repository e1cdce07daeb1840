use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use console::Term;
use log::info;
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;

use crate::auth::Token;
use crate::config::{AzureDevOpsConfig, Config};
use crate::indicator;
use crate::monitor::Monitor;
use crate::output;
use crate::providers::{AzureDevOpsClient, StatusSource};
use crate::schedule::BusinessHours;
use crate::status::CanonicalStatus;

const DEFAULT_CONFIG_FILE: &str = "buildlight.toml";

#[derive(Parser)]
#[command(name = "buildlight")]
#[command(author, version, about = "Azure DevOps build traffic light", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file (TOML, JSON or YAML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Personal access token, overrides the configured one
    #[arg(long, global = true, env = "AZURE_DEVOPS_PAT", hide_env_values = true)]
    token: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Monitor the pipeline and drive the light (default)
    Run {
        /// Use the simulated indicator even on a Raspberry Pi
        #[arg(long, default_value_t = false)]
        simulate: bool,

        /// Seconds between checks
        #[arg(short, long)]
        interval: Option<u64>,

        /// Run the startup self-test without pauses
        #[arg(long, default_value_t = false)]
        skip_startup_delay: bool,
    },
    /// Look up the current pipeline status once and exit
    Status,
    /// Create a configuration file interactively
    Init {
        /// Overwrite an existing file
        #[arg(short, long, default_value_t = false)]
        force: bool,
    },
}

impl Cli {
    fn load_config(&self) -> Result<Config> {
        let mut config = Config::load(self.config.as_deref())?;

        if let Some(token) = &self.token {
            config.azure_devops.personal_access_token = token.clone();
        }

        config.validate()?;
        Ok(config)
    }

    async fn execute_run(
        &self,
        simulate: bool,
        interval: Option<u64>,
        skip_startup_delay: bool,
    ) -> Result<()> {
        let mut config = self.load_config()?;
        if let Some(secs) = interval {
            if secs == 0 {
                bail!("--interval must be greater than zero");
            }
            config.monitor.interval_secs = secs;
        }
        config.indicator.skip_startup_delay |= skip_startup_delay;

        let client = client_for(&config.azure_devops)?;

        let indicator = indicator::start(&config.indicator, simulate).await;
        output::print_startup(&config, indicator.driver_name());

        let monitor = Monitor::new(
            client,
            indicator,
            config.business_hours.clone(),
            config.monitor.interval(),
        );
        monitor.run().await?;

        Ok(())
    }

    async fn execute_status(&self) -> Result<()> {
        let config = self.load_config()?;
        let client = client_for(&config.azure_devops)?;

        match client.latest_status().await? {
            Some(build) => output::print_status(build.canonical(), &build.overall()),
            None => output::print_status(CanonicalStatus::Unknown, "unknown"),
        }
        Ok(())
    }

    fn execute_init(&self, force: bool) -> Result<()> {
        let path = self
            .config
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        if path.exists() && !force {
            bail!(
                "{} already exists, pass --force to overwrite it",
                path.display()
            );
        }

        let term = Term::stdout();
        let mut out = term.clone();
        let stdin = io::stdin();
        let mut input = stdin.lock();
        term.write_line("Let's create a configuration file.\n")?;

        let azure_devops = AzureDevOpsConfig {
            organization: ask(&mut input, &mut out, "Azure DevOps organization name: ")?,
            project: ask(&mut input, &mut out, "Project name: ")?,
            pipeline_id: ask(&mut input, &mut out, "Pipeline ID: ")?,
            personal_access_token: match &self.token {
                Some(token) => token.clone(),
                None => ask_secret(&mut input, &term, "Personal access token: ")?,
            },
            ..AzureDevOpsConfig::default()
        };

        let config = Config {
            azure_devops,
            business_hours: BusinessHours::weekdays(),
            ..Config::default()
        };
        config.validate()?;

        config.save(&path)?;
        term.write_line(&format!(
            "Created {}. Business hours default to Monday-Friday 07:00-18:00.",
            path.display()
        ))?;

        Ok(())
    }

    pub async fn execute(&self) -> Result<()> {
        match &self.command {
            None => self.execute_run(false, None, false).await,
            Some(Commands::Run {
                simulate,
                interval,
                skip_startup_delay,
            }) => {
                self.execute_run(*simulate, *interval, *skip_startup_delay)
                    .await
            }
            Some(Commands::Status) => self.execute_status().await,
            Some(Commands::Init { force }) => self.execute_init(*force),
        }
    }
}

fn client_for(azure: &AzureDevOpsConfig) -> Result<AzureDevOpsClient> {
    let client = AzureDevOpsClient::new(
        &azure.base_url,
        &azure.organization,
        &azure.project,
        &azure.pipeline_id,
        Token::from(azure.personal_access_token.as_str()),
    )?;

    info!(
        "Monitoring pipeline {} in {}/{}",
        azure.pipeline_id, azure.organization, azure.project
    );
    Ok(client)
}

/// Prompt until a non-empty answer arrives. `read` yields `None` at end
/// of input, which aborts instead of prompting again.
fn prompt_until_answered<W, F>(out: &mut W, prompt: &str, mut read: F) -> Result<String>
where
    W: Write,
    F: FnMut() -> io::Result<Option<String>>,
{
    loop {
        write!(out, "{prompt}")?;
        out.flush()?;

        let Some(line) = read()? else {
            bail!("input closed before '{}' was answered", prompt.trim_end());
        };
        let value = line.trim().to_string();
        if !value.is_empty() {
            return Ok(value);
        }
        writeln!(out, "Value cannot be empty. Try again.")?;
    }
}

fn ask<R: BufRead, W: Write>(input: &mut R, out: &mut W, prompt: &str) -> Result<String> {
    prompt_until_answered(out, prompt, || {
        let mut line = String::new();
        match input.read_line(&mut line)? {
            0 => Ok(None),
            _ => Ok(Some(line)),
        }
    })
}

/// Reads without echo on a terminal, and like [`ask`] otherwise.
fn ask_secret<R: BufRead>(input: &mut R, term: &Term, prompt: &str) -> Result<String> {
    if !io::stdin().is_terminal() {
        return ask(input, &mut term.clone(), prompt);
    }
    prompt_until_answered(&mut term.clone(), prompt, || {
        term.read_secure_line().map(Some)
    })
}
