use std::collections::BTreeMap;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use device_inventory::config::Config;
use device_inventory::db::seeds;
use device_inventory::SharedDeviceRepository;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Optional .env file; real environment wins
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "device_inventory=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = Config::load();
    tracing::info!("Starting device inventory");

    let repo: SharedDeviceRepository = SharedDeviceRepository::default();

    if cfg.seed_path.is_empty() {
        tracing::info!("SEED_PATH not set - starting with an empty inventory");
    } else {
        tracing::info!("Seed file: {} (strict={})", cfg.seed_path, cfg.seed_strict);
        let requests = seeds::load_seed_file(&cfg.seed_path).await?;
        seeds::seed_devices(&repo, requests, cfg.seed_strict).await?;
    }

    log_summary(&repo).await
}

/// Log device counts per site and per role
async fn log_summary(repo: &SharedDeviceRepository) -> anyhow::Result<()> {
    let devices = repo.get_all().await?;

    let mut by_site: BTreeMap<&str, usize> = BTreeMap::new();
    let mut by_role: BTreeMap<&str, usize> = BTreeMap::new();
    for device in &devices {
        *by_site.entry(device.site()).or_default() += 1;
        *by_role.entry(device.role().as_str()).or_default() += 1;
    }

    tracing::info!("Inventory holds {} devices", devices.len());
    for (site, count) in &by_site {
        tracing::info!("  site {}: {}", site, count);
    }
    for (role, count) in &by_role {
        tracing::info!("  role {}: {}", role, count);
    }
    Ok(())
}
