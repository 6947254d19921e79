use anyhow::{Context, Result};

use crate::models::*;

use super::{DeviceRepository, DuplicateKeyError, SharedDeviceRepository};

/// Outcome of a seeding run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub added: usize,
    pub skipped: usize,
}

/// Parse a JSON array of device creation requests.
pub fn parse_seed_json(data: &str) -> Result<Vec<CreateDeviceRequest>> {
    serde_json::from_str(data).context("Seed data is not a JSON array of devices")
}

/// Read and parse a seed file.
pub async fn load_seed_file(path: &str) -> Result<Vec<CreateDeviceRequest>> {
    let data = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read seed file {}", path))?;
    parse_seed_json(&data).with_context(|| format!("Invalid seed file {}", path))
}

/// Add every seed entry to the repository.
///
/// Invalid entries and duplicates are skipped with a warning. With `strict`
/// set, the first such entry aborts the run instead; entries added before
/// it stay in the repository. Backend errors always abort.
pub async fn seed_devices<R: DeviceRepository>(
    repo: &SharedDeviceRepository<R>,
    requests: Vec<CreateDeviceRequest>,
    strict: bool,
) -> Result<SeedReport> {
    let mut report = SeedReport::default();

    for (index, req) in requests.into_iter().enumerate() {
        let hostname = req.hostname.clone();
        let data = match DeviceCreate::try_from(req) {
            Ok(data) => data,
            Err(e) if strict => {
                return Err(e).with_context(|| format!("Seed entry {} ({}) is invalid", index, hostname));
            }
            Err(e) => {
                tracing::warn!("Skipping seed entry {} ({}): {}", index, hostname, e);
                report.skipped += 1;
                continue;
            }
        };

        match repo.add(data).await {
            Ok(_) => report.added += 1,
            Err(e) if !strict && e.downcast_ref::<DuplicateKeyError>().is_some() => {
                tracing::warn!("Skipping seed entry {} ({}): {}", index, hostname, e);
                report.skipped += 1;
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to seed entry {} ({})", index, hostname));
            }
        }
    }

    tracing::info!("Seeded {} devices ({} skipped)", report.added, report.skipped);
    Ok(report)
}
