use anyhow::{Context, Result};
use irradiance_baker::builder::{DiskSink, MapSink};
use irradiance_baker::cli::CliOverrides;
use irradiance_baker::config::BakeConfig;
use irradiance_baker::{MapBuilder, Panorama};
use log::{error, info};
use std::process;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = match CliOverrides::parse_from_env() {
        Ok(parsed) => parsed,
        Err(err) => {
            eprintln!("[cli] {err}");
            process::exit(2);
        }
    };
    match run(cli) {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(err) => {
            error!("bake failed: {err:?}");
            process::exit(1);
        }
    }
}

/// Returns whether every batch entry succeeded.
fn run(cli: CliOverrides) -> Result<bool> {
    let mut config = match cli.config_path() {
        Some(path) => BakeConfig::load(path)?,
        None => BakeConfig::default(),
    };
    config.apply_overrides(&cli.into_bake_overrides());
    let builder = MapBuilder::new(config.to_settings()).context("invalid bake settings")?;
    let mut sink = DiskSink::new(&config.output_dir, config.output_format.clone());

    if config.sources.is_empty() {
        info!("no sources configured; baking the generated sky into '{}'", config.output_dir.display());
        let maps = builder.bake(&Panorama::generated_sky(512))?;
        sink.accept(0, &maps)?;
        return Ok(true);
    }

    let report = builder.bake_batch(config.sources.as_slice(), &mut sink, config.failure_policy)?;
    info!("baked {}/{} panoramas into '{}'", report.succeeded(), report.entries.len(), config.output_dir.display());
    for entry in report.failed() {
        if let Some(err) = entry.error.as_ref() {
            error!("[{}] {}: {err:#}", entry.index, entry.source.display());
        }
    }
    Ok(report.all_succeeded())
}
