mod config;

use std::env;

use catalog::{ingest, Catalog, LoftyTagReader};
use config::{config_path_from_env, load_or_create_config, pick_path};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config_path = config_path_from_env();
    let (config, created) = load_or_create_config(&config_path)?;
    if created {
        info!("Created default config at {:?}", config_path);
    } else {
        info!("Loaded config from {:?}", config_path);
    }

    let mut args = env::args().skip(1);
    let music_root = pick_path(args.next(), "MUSIC_ROOT", &config_path, &config.music_root);
    let catalog_path = pick_path(
        args.next(),
        "CATALOG_PATH",
        &config_path,
        &config.catalog_path,
    );

    let catalog = open_catalog(&catalog_path)?;
    let result = run(&catalog, &music_root);
    drop(catalog);
    info!("Catalog closed.");
    result
}

// The error is returned, not logged; main prints it once on exit.
fn open_catalog(path: &std::path::Path) -> Result<Catalog, Box<dyn std::error::Error>> {
    let catalog = Catalog::open(path)
        .map_err(|err| format!("failed to open catalog {:?}: {}", path, err))?;
    Ok(catalog)
}

fn run(catalog: &Catalog, music_root: &std::path::Path) -> Result<(), Box<dyn std::error::Error>> {
    catalog.init_tables()?;
    let before = catalog.stats()?;
    info!(
        "Catalog {:?}: {} artists, {} albums, {} tracks",
        catalog.path(),
        before.artists,
        before.albums,
        before.tracks
    );

    let report = ingest(catalog, music_root, LoftyTagReader)?;
    let after = catalog.stats()?;

    println!(
        "Scanned {} files: +{} artists, +{} albums, +{} tracks ({} tracks not stored)",
        report.records,
        report.artists.created,
        report.albums.created,
        report.tracks.created,
        report.tracks.skipped + report.tracks.failed
    );
    println!(
        "Catalog: {} artists, {} albums, {} tracks",
        after.artists, after.albums, after.tracks
    );
    Ok(())
}
