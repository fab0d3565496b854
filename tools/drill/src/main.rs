use anyhow::Context;
use custody::LedgerConfig;
use reentrancy_drill::run_all;

fn main() -> Result<(), anyhow::Error> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let config = match std::env::args().nth(1) {
        Some(path) => LedgerConfig::load(&path)
            .with_context(|| format!("loading ledger config from {path}"))?,
        None => LedgerConfig::default(),
    };

    tracing::info!(ledger = %config.label, "Starting reentrancy drill");

    let reports = run_all(&config);
    println!("{}", serde_json::to_string_pretty(&reports)?);

    let failed = reports.iter().filter(|r| !r.passed).count();
    if failed > 0 {
        anyhow::bail!("{failed} of {} scenarios failed", reports.len());
    }

    tracing::info!(scenarios = reports.len(), "All scenarios passed");
    Ok(())
}
