use std::env;
use std::path::PathBuf;

use serde::Deserialize;

use crate::error::MaxrunError;

/// Planner executable looked up on PATH when not configured.
pub const DEFAULT_TOOL: &str = "maxfield-plan";

/// Root of all run output directories when not configured.
pub const DEFAULT_OUTPUT_ROOT: &str = "output";

/// Translation command for the automatic variant when not configured.
pub const DEFAULT_TRANSLATE_COMMAND: &str = "translate_output.py";

/// Config file read from the current directory unless MAXRUN_CONFIG points
/// elsewhere.
pub const CONFIG_FILE: &str = "maxrun.toml";

/// Resolved runtime configuration. Everything the provisioner needs is
/// explicit here; nothing depends on ambient process state like a shell
/// `cd` or an activated environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Planner executable: a bare name resolved via PATH or a full path.
    pub tool: PathBuf,
    /// Directory that holds run output folders, resolved against
    /// `working_dir` when relative.
    pub output_root: PathBuf,
    /// Working directory for the planner and for relative path resolution.
    pub working_dir: PathBuf,
    /// Command spawned after a successful plan when translation is on.
    pub translate_command: PathBuf,
}

/// One configuration layer. Flags, environment variables, and the config
/// file all reduce to this shape and are merged by precedence.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigOverrides {
    pub tool: Option<PathBuf>,
    pub output_root: Option<PathBuf>,
    pub working_dir: Option<PathBuf>,
    pub translate_command: Option<PathBuf>,
}

impl ConfigOverrides {
    /// Layer `self` over `lower`: set fields win, unset fields fall through.
    pub fn or(self, lower: ConfigOverrides) -> ConfigOverrides {
        ConfigOverrides {
            tool: self.tool.or(lower.tool),
            output_root: self.output_root.or(lower.output_root),
            working_dir: self.working_dir.or(lower.working_dir),
            translate_command: self.translate_command.or(lower.translate_command),
        }
    }
}

impl Config {
    /// Build the effective configuration: CLI flags over environment
    /// variables over `maxrun.toml` over built-in defaults. The working
    /// directory is canonicalized so every later path join is anchored.
    pub fn load(flags: ConfigOverrides) -> Result<Self, MaxrunError> {
        let layered = flags.or(from_env()).or(from_file()?);

        let working_dir = match layered.working_dir {
            Some(dir) => dir,
            None => env::current_dir().map_err(|e| {
                MaxrunError::Config(format!("cannot determine current directory: {e}"))
            })?,
        };
        let working_dir = std::fs::canonicalize(&working_dir).map_err(|e| {
            MaxrunError::Config(format!(
                "working directory not usable: {}: {e}",
                working_dir.display()
            ))
        })?;
        if !working_dir.is_dir() {
            return Err(MaxrunError::Config(format!(
                "working directory is not a directory: {}",
                working_dir.display()
            )));
        }

        Ok(Config {
            tool: layered.tool.unwrap_or_else(|| DEFAULT_TOOL.into()),
            output_root: layered
                .output_root
                .unwrap_or_else(|| DEFAULT_OUTPUT_ROOT.into()),
            working_dir,
            translate_command: layered
                .translate_command
                .unwrap_or_else(|| DEFAULT_TRANSLATE_COMMAND.into()),
        })
    }

    /// Warn early when the planner is unlikely to spawn. Non-fatal: the
    /// launch error at spawn time stays the authoritative failure.
    pub fn probe_tool(&self) {
        let is_bare_name = self.tool.components().count() == 1;
        if is_bare_name {
            if let Some(name) = self.tool.to_str()
                && !which_exists(name)
            {
                tracing::warn!(tool = name, "planner not found in PATH");
            }
        } else if !self.working_dir.join(&self.tool).exists() {
            tracing::warn!(
                tool = %self.tool.display(),
                "planner executable does not exist"
            );
        }
    }
}

/// Environment-variable layer.
fn from_env() -> ConfigOverrides {
    ConfigOverrides {
        tool: env::var_os("MAXRUN_TOOL").map(PathBuf::from),
        output_root: env::var_os("MAXRUN_OUTPUT_ROOT").map(PathBuf::from),
        working_dir: env::var_os("MAXRUN_WORKDIR").map(PathBuf::from),
        translate_command: env::var_os("MAXRUN_TRANSLATE").map(PathBuf::from),
    }
}

/// Config-file layer. A missing default file is fine; a file explicitly
/// named via MAXRUN_CONFIG must exist, and malformed TOML is fatal either
/// way.
fn from_file() -> Result<ConfigOverrides, MaxrunError> {
    let (path, explicit) = match env::var_os("MAXRUN_CONFIG") {
        Some(p) => (PathBuf::from(p), true),
        None => (PathBuf::from(CONFIG_FILE), false),
    };

    let text = match std::fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && !explicit => {
            return Ok(ConfigOverrides::default());
        }
        Err(e) => {
            return Err(MaxrunError::Config(format!(
                "cannot read config file {}: {e}",
                path.display()
            )));
        }
    };

    toml::from_str(&text).map_err(|e| {
        MaxrunError::Config(format!("malformed config file {}: {e}", path.display()))
    })
}

/// Check if an executable exists in PATH.
fn which_exists(name: &str) -> bool {
    std::process::Command::new("which")
        .arg(name)
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .is_ok_and(|s| s.success())
}
