use crate::sink::LogSink;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use webscope_core::BootstrapConfig;

pub async fn run(webapp: &Path, config: BootstrapConfig) -> Result<(), Box<dyn std::error::Error>> {
    let mut deployment =
        webscope_runtime::build_deployment(webapp, config, Box::new(LogSink::new()))?;

    info!("Initializing: deploying {}...", webapp.display());
    let (deployment, report) = tokio::task::spawn_blocking(move || {
        let report = deployment.deploy();
        (deployment, report)
    })
    .await?;
    let report = report?;
    if report.ok {
        info!("Initial deployment complete: {} component(s).", report.descriptor.len());
    } else {
        warn!(
            "Initial deployment failed with {} failure(s); waiting for changes.",
            report.failures.len()
        );
    }

    deployment.start();
    info!("File watcher started. Ready for changes.");
    info!("Press Ctrl+C to stop.");

    let cancel = CancellationToken::new();
    let reload_loop = tokio::spawn(deployment.run_reload_loop(cancel.clone()));

    tokio::signal::ctrl_c().await?;
    cancel.cancel();
    let deployment = reload_loop.await??;
    info!("Watcher stopped after {} pass(es).", deployment.passes());

    Ok(())
}
