//! Manifest loading, the simulated run and artifact output.

use crate::config::{CliConfig, DOCUMENTATION_FILE, REPORT_FILE, RESULTS_FILE};
use crate::error::{CliError, Result};
use chrono::{DateTime, Utc};
use clinschema_core::{
    CancellationToken, Provisioner, ProvisioningManifest, ProvisioningRun, SimulationExecutor,
};
use std::path::PathBuf;
use tracing::info;

/// The therapy-device schema shipped with the binary.
pub const BUNDLED_MANIFEST: &str = include_str!("../manifests/therapy_device.json");

/// Load the configured manifest, falling back to the bundled one.
pub fn load_manifest(config: &CliConfig) -> Result<ProvisioningManifest> {
    let manifest = match &config.manifest {
        Some(path) => {
            info!(path = %path.display(), "loading manifest");
            ProvisioningManifest::load(path)?
        }
        None => {
            info!("using bundled therapy-device manifest");
            ProvisioningManifest::from_json(BUNDLED_MANIFEST)?
        }
    };
    info!(
        database = %manifest.database.name,
        version = %manifest.database.version,
        tables = manifest.tables.len(),
        "manifest loaded"
    );
    Ok(manifest)
}

/// Provision a manifest against the simulation executor.
pub fn provision(
    manifest: &ProvisioningManifest,
    generated_at: DateTime<Utc>,
    cancel: CancellationToken,
) -> Result<ProvisioningRun> {
    let executor = SimulationExecutor::new();
    let run = Provisioner::run_manifest(manifest, &executor, generated_at, cancel)?;
    info!(units = executor.applied_count(), "simulation finished");
    Ok(run)
}

/// Write the documentation, report and apply results into the configured
/// output directory. Writes nothing when output is disabled.
pub fn write_artifacts(config: &CliConfig, run: &ProvisioningRun) -> Result<Vec<PathBuf>> {
    let Some(dir) = &config.output_dir else {
        return Ok(Vec::new());
    };
    std::fs::create_dir_all(dir).map_err(|source| CliError::Write {
        path: dir.display().to_string(),
        source,
    })?;

    let artifacts = [
        (DOCUMENTATION_FILE, run.document.to_json_pretty()?),
        (REPORT_FILE, serde_json::to_string_pretty(&run.report)?),
        (RESULTS_FILE, serde_json::to_string_pretty(&run.results)?),
    ];

    let mut written = Vec::with_capacity(artifacts.len());
    for (file_name, contents) in artifacts {
        let path = dir.join(file_name);
        std::fs::write(&path, contents).map_err(|source| CliError::Write {
            path: path.display().to_string(),
            source,
        })?;
        info!(path = %path.display(), "wrote artifact");
        written.push(path);
    }
    Ok(written)
}
