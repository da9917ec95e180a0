use std::path::Path;

use crate::config::Config;
use crate::error::MaxrunError;
use crate::plan::{self, RunRequest};
use crate::runner;
use crate::translate;

/// Create the run's output directory, parents included. Repeat-safe: an
/// existing directory and whatever it already contains are left untouched.
pub async fn ensure_output_dir(path: &Path) -> Result<(), MaxrunError> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|e| MaxrunError::DirectoryCreation {
            path: path.to_path_buf(),
            source: e,
        })
}

/// Carry out a resolved run end to end: provision the output directory,
/// invoke the planner, and optionally run translation. Validation already
/// happened during resolution; from here the only failures are directory
/// creation and the planner itself.
pub async fn execute(
    request: &RunRequest,
    config: &Config,
    translate: bool,
) -> Result<(), MaxrunError> {
    match tokio::fs::read_to_string(&request.input_file).await {
        Ok(content) => {
            let waypoints = plan::count_waypoints(&content);
            if waypoints == 0 {
                tracing::warn!("plan file has no waypoint lines");
            } else {
                tracing::info!(waypoints, plan = %request.plan_name, "plan file loaded");
            }
        }
        Err(e) => tracing::debug!("could not preview plan file: {e}"),
    }

    ensure_output_dir(&request.output_dir).await?;
    tracing::info!(output_dir = %request.output_dir.display(), "output directory ready");

    runner::invoke_plan(request, &config.tool, &config.working_dir).await?;

    if translate {
        // The outcome is logged inside; a missing or failed translation
        // never changes the run's status.
        let _ = translate::run_translation(&config.translate_command, &config.working_dir).await;
    }

    Ok(())
}
