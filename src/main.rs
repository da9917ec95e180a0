use clap::Parser;
use console::style;

use maxrun::cli::{self, Cli};
use maxrun::config::Config;
use maxrun::error::MaxrunError;
use maxrun::plan::RunRequest;
use maxrun::provision;
use maxrun::runner;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(default_level.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    // .env may supply MAXRUN_* variables; load it before the config does
    // its environment pass.
    dotenvy::dotenv().ok();

    std::process::exit(run(cli).await);
}

async fn run(cli: Cli) -> i32 {
    let config = match Config::load(cli.config_overrides()) {
        Ok(config) => config,
        Err(err) => return fail(&err),
    };

    let params = match cli::gather_params(&cli) {
        Ok(params) => params,
        Err(err) => {
            eprintln!("{} {err}", style("error:").red().bold());
            return 2;
        }
    };

    let request = match RunRequest::resolve(
        &params,
        &config.working_dir,
        &config.output_root,
        chrono::Local::now(),
    ) {
        Ok(request) => request,
        Err(err) => return fail(&err),
    };

    if cli.dry_run {
        return match print_dry_run(&request, &config, cli.json) {
            Ok(()) => 0,
            Err(err) => fail(&err),
        };
    }

    config.probe_tool();

    match provision::execute(&request, &config, cli.translate).await {
        Ok(()) => 0,
        Err(err) => fail(&err),
    }
}

fn fail(err: &MaxrunError) -> i32 {
    eprintln!("{} {}", style("error:").red().bold(), err.user_message());
    err.exit_code()
}

fn print_dry_run(request: &RunRequest, config: &Config, json: bool) -> Result<(), MaxrunError> {
    if json {
        let command: Vec<String> = std::iter::once(config.tool.display().to_string())
            .chain(
                runner::plan_args(request)
                    .iter()
                    .map(|a| a.to_string_lossy().into_owned()),
            )
            .collect();
        let doc = serde_json::json!({ "command": command, "request": request });
        let rendered = serde_json::to_string_pretty(&doc)
            .map_err(|e| MaxrunError::Other(format!("cannot render run as JSON: {e}")))?;
        println!("{rendered}");
    } else {
        println!("{}", runner::render_command(&config.tool, request));
        println!("output directory: {}", request.output_dir.display());
    }
    Ok(())
}
