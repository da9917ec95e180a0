use std::path::Path;

use tokio::process::Command;

/// Outcome of the optional translation step. Never fatal: the planning
/// run's status is already decided by the time this executes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranslateOutcome {
    Completed,
    Missing,
    Failed { code: i32 },
}

/// Run the translation command after a successful plan, with no arguments
/// and inherited stdio. The command is expected to pick up the newest
/// output on its own and write under `output/pt`; that convention belongs
/// to the script, not to this tool. A missing or failing command is a
/// warning only.
pub async fn run_translation(command: &Path, working_dir: &Path) -> TranslateOutcome {
    let resolved = working_dir.join(command);
    if !resolved.is_file() {
        tracing::warn!(
            command = %resolved.display(),
            "translation command not found, skipping"
        );
        return TranslateOutcome::Missing;
    }

    let spawned = Command::new(&resolved)
        .current_dir(working_dir)
        .stdin(std::process::Stdio::null())
        .process_group(0)
        .kill_on_drop(true)
        .spawn();

    let mut child = match spawned {
        Ok(child) => child,
        Err(e) => {
            tracing::warn!(command = %resolved.display(), "translation failed to launch: {e}");
            return TranslateOutcome::Failed { code: -1 };
        }
    };

    match child.wait().await {
        Ok(status) if status.success() => {
            tracing::info!("translation finished");
            TranslateOutcome::Completed
        }
        Ok(status) => {
            let code = status.code().unwrap_or(-1);
            tracing::warn!(code, "translation failed; planning output is unaffected");
            TranslateOutcome::Failed { code }
        }
        Err(e) => {
            tracing::warn!("failed to wait for translation: {e}");
            TranslateOutcome::Failed { code: -1 }
        }
    }
}
