use anyhow::Result;
use stampede::catalog::Catalog;
use stampede::config::Config;
use stampede::engine::{LogProgress, Orchestrator, RunOptions};
use stampede::report::JsonFileStore;
use stampede::telemetry;
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    telemetry::init_tracing();

    let cfg = Config::load()?;
    let catalog = Catalog::builtin();

    let mut args = std::env::args().skip(1);
    let scenario_id = match args.next() {
        Some(id) => id,
        None => {
            let ids: Vec<_> = catalog.scenario_ids().collect();
            anyhow::bail!("usage: stampede <scenario> [vus]\navailable: {}", ids.join(", "));
        }
    };
    let vus = args.next().map(|v| v.parse::<usize>()).transpose()?;

    let store = Arc::new(JsonFileStore::new(cfg.report.dir.clone()));
    let orchestrator = Arc::new(Orchestrator::new(
        &cfg,
        catalog,
        store,
        Arc::new(LogProgress),
    )?);

    info!(
        target = cfg.target.effective_base_url(),
        scenario = %scenario_id,
        "dispatching"
    );

    let handle = orchestrator.start(&scenario_id, RunOptions { vus, seed: cfg.engine.seed })?;

    // Ctrl+C / SIGTERM stops the run cooperatively; in-flight requests finish
    // and a partial report is still persisted by the driver.
    let watcher = tokio::spawn({
        let orchestrator = Arc::clone(&orchestrator);
        let scenario_id = scenario_id.clone();
        async move {
            telemetry::shutdown_signal().await;
            warn!(scenario = %scenario_id, "interrupt received, stopping run");
            orchestrator.stop(&scenario_id);
        }
    });

    handle.wait().await;
    watcher.abort();

    match orchestrator.report(&scenario_id).await {
        Some(report) => println!("{}", serde_json::to_string_pretty(&report)?),
        None => warn!(scenario = %scenario_id, "no report was persisted"),
    }
    Ok(())
}
