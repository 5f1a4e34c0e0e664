use anyhow::{anyhow, Context, Result};
use irradiance_baker::Panorama;
use std::env;
use std::path::PathBuf;
use std::process;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    if let Err(err) = run() {
        eprintln!("error: {err:?}");
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let mut args = env::args().skip(1);
    let output = args
        .next()
        .map(PathBuf::from)
        .ok_or_else(|| anyhow!("usage: sky_synth <output.tga> [size]"))?;
    let size = match args.next() {
        Some(value) => value.parse::<u32>().with_context(|| format!("invalid size '{value}'"))?,
        None => 512,
    };
    let panorama = Panorama::generated_sky(size);
    panorama.save(&output)?;
    log::info!("wrote {}x{} fisheye sky to '{}'", panorama.width(), panorama.height(), output.display());
    Ok(())
}
