use snapflow::engine::core::spill::cleanup_spill_paths;
use snapflow::logging;
use snapflow::shared::config::CONFIG;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init()?;
    info!(target: "snapflow::main", "Starting snapflow");

    if CONFIG.spill.cleanup_on_startup {
        let removed = cleanup_spill_paths(&CONFIG.spill.paths);
        info!(target: "snapflow::main", removed, "Cleaned stale spill files");
    }

    info!(
        target: "snapflow::main",
        memory_limit = CONFIG.memory.query_max_memory_bytes,
        spill_enabled = CONFIG.spill.enabled,
        snapshot_enabled = CONFIG.snapshot.enabled,
        "Runtime configured"
    );
    Ok(())
}
