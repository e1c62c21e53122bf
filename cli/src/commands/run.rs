use bioscfg_core::context::AppContext;
use bioscfg_core::error::CliError;
use bioscfg_core::runner::Cancellation;
use bioscfg_core::TaskHandler;
use tokio::io::{AsyncBufRead, BufReader};

use crate::commands::cli::RunArgs;
use crate::dispatch::Dispatcher;

async fn open_tasks(path: &str) -> Result<Box<dyn AsyncBufRead + Unpin + Send>, CliError> {
    if path == "-" {
        return Ok(Box::new(BufReader::new(tokio::io::stdin())));
    }
    let file = tokio::fs::File::open(path)
        .await
        .map_err(|e| CliError::Dispatch(format!("open {path}: {e}")))?;
    Ok(Box::new(BufReader::new(file)))
}

pub async fn run_cmd(args: RunArgs, ctx: &AppContext) -> Result<i32, CliError> {
    let cfg = ctx.cfg();
    let services = ctx.build_services().await?;
    if cfg.dry_run {
        tracing::warn!(target: "bioscfg.cli", "dry-run enabled, no BMC will be contacted");
    }

    let worker_id = format!("bioscfg-{}", uuid::Uuid::new_v4());
    tracing::info!(
        target: "bioscfg.cli",
        worker_id = %worker_id,
        facility = %cfg.facility_code,
        concurrency = cfg.concurrency,
        tasks = %args.tasks,
        "worker starting"
    );

    let handler = TaskHandler::from_config(services, cfg).with_worker_id(worker_id);
    let dispatcher = Dispatcher::new(handler, cfg);

    let (cancel_handle, cancel) = Cancellation::new();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!(target: "bioscfg.cli", "interrupt received, cancelling in-flight tasks");
            cancel_handle.cancel();
        }
    });

    let reader = open_tasks(&args.tasks).await?;
    dispatcher.run(reader, cancel).await?;
    Ok(0)
}
