use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::error::MaxrunError;

/// Agents assigned to the plan when the user leaves the prompt blank.
pub const DEFAULT_NUM_AGENTS: u32 = 3;

/// CPU count handed to the planner when blank; 0 tells it to use all cores.
pub const DEFAULT_NUM_CPUS: u32 = 0;

/// Output folder timestamp, local time, fixed width: `2024-03-05_1407`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H%M";

/// Raw run parameters as acquired from flags or prompts, before any
/// validation. Counts stay strings here so blank input can fall back to
/// defaults during resolution rather than in the prompt layer.
#[derive(Debug, Clone, Default)]
pub struct RunParams {
    pub input_file: String,
    pub num_agents: Option<String>,
    pub num_cpus: Option<String>,
    pub timestamped: bool,
}

/// A single invocation's resolved configuration: validated input file,
/// derived plan name and output directory, and parsed counts. Built once
/// per run and discarded after the planner exits.
#[derive(Debug, Clone, Serialize)]
pub struct RunRequest {
    pub input_file: PathBuf,
    pub plan_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    pub num_agents: u32,
    pub num_cpus: u32,
    pub output_dir: PathBuf,
}

impl RunRequest {
    /// Resolve raw parameters into a validated request.
    ///
    /// Validation happens strictly before any side effect: the input file
    /// must exist, the plan name (file name minus extension) must be
    /// non-empty, and the counts must parse within range. Relative paths are
    /// resolved against `working_dir`. The clock is injected so resolution
    /// is deterministic under test.
    pub fn resolve(
        params: &RunParams,
        working_dir: &Path,
        output_root: &Path,
        now: DateTime<Local>,
    ) -> Result<Self, MaxrunError> {
        let name = params.input_file.trim();
        if name.is_empty() {
            return Err(MaxrunError::InputNotFound {
                path: PathBuf::new(),
            });
        }

        let input_file = working_dir.join(name);
        let is_file = std::fs::metadata(&input_file)
            .map(|m| m.is_file())
            .unwrap_or(false);
        if !is_file {
            return Err(MaxrunError::InputNotFound { path: input_file });
        }

        let plan_name = input_file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        if plan_name.is_empty() {
            return Err(MaxrunError::InvalidName { path: input_file });
        }

        let output_root = working_dir.join(output_root);
        let (timestamp, output_dir) = if params.timestamped {
            let stamp = now.format(TIMESTAMP_FORMAT).to_string();
            let dir = output_root.join(format!("{plan_name}_{stamp}"));
            (Some(stamp), dir)
        } else {
            // Fixed mode reuses the same directory on every run; concurrent
            // runs will overwrite each other's artifacts there.
            (None, output_root)
        };

        let num_agents = parse_count(
            "number of agents",
            params.num_agents.as_deref(),
            DEFAULT_NUM_AGENTS,
            1,
        )?;
        let num_cpus = parse_count(
            "number of CPUs",
            params.num_cpus.as_deref(),
            DEFAULT_NUM_CPUS,
            0,
        )?;

        Ok(Self {
            input_file,
            plan_name,
            timestamp,
            num_agents,
            num_cpus,
            output_dir,
        })
    }
}

/// Parse a count field, falling back to `default` only when the value is
/// missing or blank.
fn parse_count(
    field: &'static str,
    raw: Option<&str>,
    default: u32,
    min: u32,
) -> Result<u32, MaxrunError> {
    let reason = if min > 0 {
        "must be a positive integer"
    } else {
        "must be a non-negative integer"
    };

    let Some(raw) = raw else {
        return Ok(default);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(default);
    }

    let value = trimmed
        .parse::<u32>()
        .map_err(|_| MaxrunError::InvalidParameter {
            field,
            value: raw.to_string(),
            reason: reason.to_string(),
        })?;
    if value < min {
        return Err(MaxrunError::InvalidParameter {
            field,
            value: raw.to_string(),
            reason: reason.to_string(),
        });
    }
    Ok(value)
}

/// Count the waypoint lines of a plan file: non-blank lines that are not
/// `#` comments. The file format is otherwise opaque to this tool.
pub fn count_waypoints(content: &str) -> usize {
    content
        .lines()
        .filter(|line| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_clock() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 5, 14, 7, 0).unwrap()
    }

    fn params(input: &str) -> RunParams {
        RunParams {
            input_file: input.to_string(),
            ..RunParams::default()
        }
    }

    fn write_plan(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), "portal one; 0,0\nportal two; 1,1\n").unwrap();
    }

    #[test]
    fn blank_counts_resolve_to_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        write_plan(tmp.path(), "meu_plano.txt");

        let mut p = params("meu_plano.txt");
        p.num_agents = Some("   ".into());
        p.num_cpus = Some(String::new());
        let req = RunRequest::resolve(&p, tmp.path(), Path::new("output"), fixed_clock()).unwrap();
        assert_eq!(req.num_agents, DEFAULT_NUM_AGENTS);
        assert_eq!(req.num_cpus, DEFAULT_NUM_CPUS);

        let p = params("meu_plano.txt");
        let req = RunRequest::resolve(&p, tmp.path(), Path::new("output"), fixed_clock()).unwrap();
        assert_eq!(req.num_agents, 3);
        assert_eq!(req.num_cpus, 0);
    }

    #[test]
    fn explicit_counts_parse() {
        let tmp = tempfile::tempdir().unwrap();
        write_plan(tmp.path(), "meu_plano.txt");

        let mut p = params("meu_plano.txt");
        p.num_agents = Some("5".into());
        p.num_cpus = Some("8".into());
        let req = RunRequest::resolve(&p, tmp.path(), Path::new("output"), fixed_clock()).unwrap();
        assert_eq!(req.num_agents, 5);
        assert_eq!(req.num_cpus, 8);
    }

    #[test]
    fn non_numeric_agents_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        write_plan(tmp.path(), "meu_plano.txt");

        let mut p = params("meu_plano.txt");
        p.num_agents = Some("three".into());
        let err =
            RunRequest::resolve(&p, tmp.path(), Path::new("output"), fixed_clock()).unwrap_err();
        assert!(matches!(
            err,
            MaxrunError::InvalidParameter {
                field: "number of agents",
                ..
            }
        ));
    }

    #[test]
    fn zero_agents_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        write_plan(tmp.path(), "meu_plano.txt");

        let mut p = params("meu_plano.txt");
        p.num_agents = Some("0".into());
        let err =
            RunRequest::resolve(&p, tmp.path(), Path::new("output"), fixed_clock()).unwrap_err();
        assert!(matches!(err, MaxrunError::InvalidParameter { .. }));
    }

    #[test]
    fn negative_cpus_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        write_plan(tmp.path(), "meu_plano.txt");

        let mut p = params("meu_plano.txt");
        p.num_cpus = Some("-1".into());
        let err =
            RunRequest::resolve(&p, tmp.path(), Path::new("output"), fixed_clock()).unwrap_err();
        assert!(matches!(
            err,
            MaxrunError::InvalidParameter {
                field: "number of CPUs",
                ..
            }
        ));
    }

    #[test]
    fn zero_cpus_allowed() {
        let tmp = tempfile::tempdir().unwrap();
        write_plan(tmp.path(), "meu_plano.txt");

        let mut p = params("meu_plano.txt");
        p.num_cpus = Some("0".into());
        let req = RunRequest::resolve(&p, tmp.path(), Path::new("output"), fixed_clock()).unwrap();
        assert_eq!(req.num_cpus, 0);
    }

    #[test]
    fn missing_input_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let err = RunRequest::resolve(
            &params("nao_existe.txt"),
            tmp.path(),
            Path::new("output"),
            fixed_clock(),
        )
        .unwrap_err();
        assert!(matches!(err, MaxrunError::InputNotFound { .. }));
    }

    #[test]
    fn blank_input_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let err = RunRequest::resolve(
            &params("   "),
            tmp.path(),
            Path::new("output"),
            fixed_clock(),
        )
        .unwrap_err();
        assert!(matches!(err, MaxrunError::InputNotFound { .. }));
    }

    #[test]
    fn directory_as_input_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir(tmp.path().join("plans")).unwrap();
        let err = RunRequest::resolve(
            &params("plans"),
            tmp.path(),
            Path::new("output"),
            fixed_clock(),
        )
        .unwrap_err();
        assert!(matches!(err, MaxrunError::InputNotFound { .. }));
    }

    #[test]
    fn plan_name_strips_extension() {
        let tmp = tempfile::tempdir().unwrap();
        write_plan(tmp.path(), "meu_plano.txt");
        let req = RunRequest::resolve(
            &params("meu_plano.txt"),
            tmp.path(),
            Path::new("output"),
            fixed_clock(),
        )
        .unwrap();
        assert_eq!(req.plan_name, "meu_plano");
    }

    #[test]
    fn plan_name_keeps_inner_dots() {
        let tmp = tempfile::tempdir().unwrap();
        write_plan(tmp.path(), "centro.v2.txt");
        let req = RunRequest::resolve(
            &params("centro.v2.txt"),
            tmp.path(),
            Path::new("output"),
            fixed_clock(),
        )
        .unwrap();
        assert_eq!(req.plan_name, "centro.v2");
    }

    #[test]
    fn plan_without_extension_keeps_full_name() {
        let tmp = tempfile::tempdir().unwrap();
        write_plan(tmp.path(), "meu_plano");
        let req = RunRequest::resolve(
            &params("meu_plano"),
            tmp.path(),
            Path::new("output"),
            fixed_clock(),
        )
        .unwrap();
        assert_eq!(req.plan_name, "meu_plano");
    }

    #[test]
    fn timestamped_output_dir_at_fixed_clock() {
        let tmp = tempfile::tempdir().unwrap();
        write_plan(tmp.path(), "meu_plano.txt");

        let mut p = params("meu_plano.txt");
        p.timestamped = true;
        let req = RunRequest::resolve(&p, tmp.path(), Path::new("output"), fixed_clock()).unwrap();
        assert_eq!(req.timestamp.as_deref(), Some("2024-03-05_1407"));
        assert_eq!(
            req.output_dir,
            tmp.path().join("output").join("meu_plano_2024-03-05_1407")
        );
    }

    #[test]
    fn timestamp_is_zero_padded() {
        let tmp = tempfile::tempdir().unwrap();
        write_plan(tmp.path(), "meu_plano.txt");

        let mut p = params("meu_plano.txt");
        p.timestamped = true;
        let early = Local.with_ymd_and_hms(2024, 1, 2, 3, 4, 0).unwrap();
        let req = RunRequest::resolve(&p, tmp.path(), Path::new("output"), early).unwrap();
        assert_eq!(req.timestamp.as_deref(), Some("2024-01-02_0304"));
    }

    #[test]
    fn fixed_mode_resolves_to_output_root() {
        let tmp = tempfile::tempdir().unwrap();
        write_plan(tmp.path(), "meu_plano.txt");

        let req = RunRequest::resolve(
            &params("meu_plano.txt"),
            tmp.path(),
            Path::new("output"),
            fixed_clock(),
        )
        .unwrap();
        assert_eq!(req.timestamp, None);
        assert_eq!(req.output_dir, tmp.path().join("output"));
    }

    #[test]
    fn relative_input_resolves_against_working_dir() {
        let tmp = tempfile::tempdir().unwrap();
        write_plan(tmp.path(), "meu_plano.txt");

        let req = RunRequest::resolve(
            &params("meu_plano.txt"),
            tmp.path(),
            Path::new("output"),
            fixed_clock(),
        )
        .unwrap();
        assert_eq!(req.input_file, tmp.path().join("meu_plano.txt"));
    }

    #[test]
    fn absolute_output_root_is_kept() {
        let tmp = tempfile::tempdir().unwrap();
        write_plan(tmp.path(), "meu_plano.txt");

        let root = tmp.path().join("elsewhere");
        let req = RunRequest::resolve(&params("meu_plano.txt"), tmp.path(), &root, fixed_clock())
            .unwrap();
        assert_eq!(req.output_dir, root);
    }

    #[test]
    fn waypoint_count_skips_comments_and_blanks() {
        let content = "# cabecalho\n\nportal um; 0,0\nportal dois; 1,1\n   \n# fim\n";
        assert_eq!(count_waypoints(content), 2);
    }

    #[test]
    fn waypoint_count_empty_plan_is_zero() {
        assert_eq!(count_waypoints("# so comentarios\n\n"), 0);
    }
}
