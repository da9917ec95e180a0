use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::Parser;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Input};

use crate::config::ConfigOverrides;
use crate::plan::{DEFAULT_NUM_AGENTS, RunParams};

/// Provision an output folder and run the Maxfield planner.
#[derive(Debug, Parser)]
#[command(
    name = "maxrun",
    version,
    about = "Provision an output folder and run the Maxfield planner"
)]
pub struct Cli {
    /// Plan file with one portal per line. Prompted for when omitted on a
    /// terminal.
    pub plan: Option<String>,

    /// Number of agents in the plan (blank or omitted: 3).
    #[arg(long, value_name = "N")]
    pub agents: Option<String>,

    /// CPU cores for the planner (blank or omitted: 0, meaning all).
    #[arg(long, value_name = "N")]
    pub cpus: Option<String>,

    /// Write results to a fresh output/<plan>_<timestamp> folder instead of
    /// reusing output/.
    #[arg(long)]
    pub timestamped: bool,

    /// Run the configured translation command after a successful plan.
    #[arg(long)]
    pub translate: bool,

    /// Print the resolved run without creating directories or spawning the
    /// planner.
    #[arg(long)]
    pub dry_run: bool,

    /// With --dry-run, print the resolved run as JSON.
    #[arg(long, requires = "dry_run")]
    pub json: bool,

    /// Never prompt; required values must come from arguments.
    #[arg(long)]
    pub non_interactive: bool,

    /// Planner executable (overrides MAXRUN_TOOL and maxrun.toml).
    #[arg(long, value_name = "PATH")]
    pub tool: Option<PathBuf>,

    /// Working directory for the planner and for relative paths.
    #[arg(long, value_name = "DIR")]
    pub workdir: Option<PathBuf>,

    /// Root directory for run output folders.
    #[arg(long, value_name = "DIR")]
    pub output_root: Option<PathBuf>,

    /// Translation command used by --translate.
    #[arg(long, value_name = "PATH")]
    pub translate_cmd: Option<PathBuf>,

    /// Provisioner diagnostics at debug level.
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Flag-level configuration layer, highest precedence.
    pub fn config_overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            tool: self.tool.clone(),
            output_root: self.output_root.clone(),
            working_dir: self.workdir.clone(),
            translate_command: self.translate_cmd.clone(),
        }
    }
}

/// Acquire raw run parameters, prompting only when the plan file was not
/// given and a terminal is attached. This layer never parses counts or
/// touches the filesystem; resolution owns all validation.
pub fn gather_params(cli: &Cli) -> Result<RunParams> {
    if let Some(plan) = &cli.plan {
        return Ok(RunParams {
            input_file: plan.clone(),
            num_agents: cli.agents.clone(),
            num_cpus: cli.cpus.clone(),
            timestamped: cli.timestamped,
        });
    }

    if cli.non_interactive || !std::io::stdin().is_terminal() {
        bail!("a plan file argument is required when running non-interactively");
    }

    prompt_params(cli)
}

fn prompt_params(cli: &Cli) -> Result<RunParams> {
    let theme = ColorfulTheme::default();

    let input_file: String = Input::with_theme(&theme)
        .with_prompt("Plan file")
        .interact_text()?;

    let num_agents = match &cli.agents {
        Some(v) => Some(v.clone()),
        None => prompt_count(
            &theme,
            &format!("Number of agents (blank: {DEFAULT_NUM_AGENTS})"),
        )?,
    };

    let num_cpus = match &cli.cpus {
        Some(v) => Some(v.clone()),
        None => prompt_count(&theme, "Number of CPUs (blank: all)")?,
    };

    let timestamped = if cli.timestamped {
        true
    } else {
        Confirm::with_theme(&theme)
            .with_prompt("Create a timestamped output folder?")
            .default(true)
            .interact()?
    };

    Ok(RunParams {
        input_file,
        num_agents,
        num_cpus,
        timestamped,
    })
}

/// Count prompts accept blank input; blank maps to None so the defaults
/// are applied during resolution, not here.
fn prompt_count(theme: &ColorfulTheme, prompt: &str) -> Result<Option<String>> {
    let raw: String = Input::with_theme(theme)
        .with_prompt(prompt)
        .allow_empty(true)
        .interact_text()?;
    Ok(if raw.trim().is_empty() { None } else { Some(raw) })
}
