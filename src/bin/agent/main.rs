mod brain;
mod config;
mod dom;
mod hands;

use anyhow::Result;
use clap::Parser;
use dotenvy::dotenv;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use config::Args;
use vision_rpa::{ControlLoop, RunReport, RunStatus};

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();

    // RUST_LOG=debug shows raw model replies.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();

    match run(args).await {
        Ok(report) => {
            info!(
                iterations = report.iterations,
                actions = report.history.len(),
                blocked = report.blocked.len(),
                "run ended"
            );
            match report.status {
                RunStatus::Finished => {
                    info!("task finished");
                    ExitCode::SUCCESS
                }
                RunStatus::Errored(cause) => {
                    error!("task failed: {}", cause);
                    ExitCode::FAILURE
                }
            }
        }
        Err(e) => {
            error!("agent could not start: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<RunReport> {
    info!("launching Chrome...");
    let settings = hands::LaunchSettings {
        headless: args.headless,
        chrome_path: args.chrome_path.clone(),
        attach: args.attach.clone(),
    };
    let session = tokio::task::spawn_blocking(move || hands::BrowserSession::launch(&settings))
        .await
        .map_err(|e| anyhow::anyhow!("Browser launch panicked: {}", e))??;

    let planner = brain::VisionPlanner::new(
        &args.base_url,
        args.api_key.clone(),
        args.model.clone(),
        args.max_tokens,
    );
    info!(model = %args.model, endpoint = %args.base_url, "planner ready");

    let control = ControlLoop::new(&planner, &session, &session, args.loop_config());
    Ok(control.run(&args.url, &args.task).await)
}
