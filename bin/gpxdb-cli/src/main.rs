//! GPXDB CLI
//!
//! Maintains the track metadata store for a directory of GPX files: scans
//! for new files, analyses them in the background and queries the results.

mod output;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use gpxdb_cache::reader::is_analysis_needed;
use gpxdb_cache::{
    Appearance, FilterKind, GpxDbHelper, MetricSystem, RangeFilter, TrackFilters,
};
use gpxdb_common::{Config, GpxParameter};
use gpxdb_store::{ItemStore, RedbItemStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "gpxdb")]
#[command(about = "GPX track metadata cache")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, env = "GPXDB_CONFIG", default_value = "gpxdb.toml")]
    config: PathBuf,

    /// Track directory (overrides config)
    #[arg(long, env = "GPXDB_TRACKS_DIR")]
    tracks_dir: Option<PathBuf>,

    /// Store file (overrides config)
    #[arg(long, env = "GPXDB_STORE")]
    store: Option<PathBuf>,

    /// Log level (overrides config)
    #[arg(long, env = "GPXDB_LOG_LEVEL")]
    log_level: Option<String>,

    /// Print JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Sync the store with the track directory and analyse stale tracks
    Scan,
    /// List stored tracks
    List {
        #[command(flatten)]
        filters: FilterArgs,
    },
    /// Show one track, analysing it first if needed
    Show {
        /// Track file
        path: PathBuf,
    },
    /// Rename a track file and move its record
    Rename { old: PathBuf, new: PathBuf },
    /// Delete the record of a track (the file is kept)
    Remove { path: PathBuf },
    /// Change how a track is drawn
    SetAppearance {
        path: PathBuf,
        #[command(flatten)]
        appearance: AppearanceArgs,
    },
    /// Summaries used to build filter lists
    Stats,
}

#[derive(clap::Args, Debug)]
struct FilterArgs {
    /// Display units for lengths and speeds
    #[arg(long, value_enum, default_value_t = Units::Km)]
    units: Units,
    /// Minimum length in display units
    #[arg(long)]
    min_length: Option<f64>,
    /// Maximum length in display units
    #[arg(long)]
    max_length: Option<f64>,
    /// Minimum top speed in display units
    #[arg(long)]
    min_speed: Option<f64>,
    /// Maximum top speed in display units
    #[arg(long)]
    max_speed: Option<f64>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Units {
    Km,
    Mi,
    Nm,
}

impl From<Units> for MetricSystem {
    fn from(units: Units) -> Self {
        match units {
            Units::Km => Self::Kilometers,
            Units::Mi => Self::Miles,
            Units::Nm => Self::NauticalMiles,
        }
    }
}

#[derive(clap::Args, Debug)]
struct AppearanceArgs {
    /// Colour as #RRGGBB or #AARRGGBB
    #[arg(long)]
    color: Option<String>,
    #[arg(long)]
    width: Option<String>,
    #[arg(long)]
    show_arrows: Option<bool>,
    #[arg(long)]
    show_start_finish: Option<bool>,
    /// 0 = none, 1 = by distance, 2 = by time
    #[arg(long)]
    split_type: Option<i64>,
    #[arg(long)]
    split_interval: Option<f64>,
    #[arg(long)]
    coloring_type: Option<String>,
}

impl AppearanceArgs {
    /// Overlay the given flags on the current appearance
    fn apply(&self, mut appearance: Appearance) -> Result<Appearance> {
        if let Some(color) = &self.color {
            appearance.color = Some(parse_color(color)?);
        }
        if let Some(width) = &self.width {
            appearance.width = Some(width.clone());
        }
        if let Some(show) = self.show_arrows {
            appearance.show_arrows = show;
        }
        if let Some(show) = self.show_start_finish {
            appearance.show_start_finish = show;
        }
        if let Some(split_type) = self.split_type {
            appearance.split_type = split_type;
        }
        if let Some(interval) = self.split_interval {
            appearance.split_interval = interval;
        }
        if let Some(coloring) = &self.coloring_type {
            appearance.coloring_type = Some(coloring.clone());
        }
        Ok(appearance)
    }
}

/// Parse `#RRGGBB` (opaque) or `#AARRGGBB` into an ARGB integer
fn parse_color(s: &str) -> Result<i64> {
    let hex = s.strip_prefix('#').unwrap_or(s);
    let value = i64::from_str_radix(hex, 16).with_context(|| format!("invalid colour '{s}'"))?;
    match hex.len() {
        6 => Ok(value | 0xFF00_0000),
        8 => Ok(value),
        _ => bail!("invalid colour '{s}', expected #RRGGBB or #AARRGGBB"),
    }
}

/// Load the config file if it exists, then apply flag overrides
fn load_config(args: &Args) -> Result<Config> {
    let mut config: Config = if args.config.exists() {
        let config_str = std::fs::read_to_string(&args.config)
            .with_context(|| format!("reading {}", args.config.display()))?;
        toml::from_str(&config_str).unwrap_or_else(|e| {
            eprintln!("Warning: Failed to parse config file: {e}");
            Config::default()
        })
    } else {
        Config::default()
    };

    if let Some(dir) = &args.tracks_dir {
        config.tracks.dir.clone_from(dir);
    }
    if let Some(store) = &args.store {
        config.store.path.clone_from(store);
    }
    if let Some(level) = &args.log_level {
        config.logging.level.clone_from(level);
    }
    config.validate()?;
    Ok(config)
}

fn range(kind: FilterKind, from: Option<f64>, to: Option<f64>) -> Option<RangeFilter> {
    if from.is_none() && to.is_none() {
        return None;
    }
    let filter = RangeFilter::new(kind);
    let (min, max) = (filter.min, filter.max);
    Some(filter.with_window(from.unwrap_or(min), to.unwrap_or(max)))
}

impl FilterArgs {
    fn to_filters(&self) -> TrackFilters {
        let mut filters = TrackFilters::new(self.units.into());
        filters.filters.extend(range(FilterKind::Length, self.min_length, self.max_length));
        filters.filters.extend(range(FilterKind::MaxSpeed, self.min_speed, self.max_speed));
        filters
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Tracks: {}", config.tracks.dir.display());
    info!("Store: {}", config.store.path.display());

    let store: Arc<dyn ItemStore> = Arc::new(
        RedbItemStore::open(&config.store.path)
            .with_context(|| format!("opening store {}", config.store.path.display()))?,
    );
    let helper = GpxDbHelper::new(store, config.tracks.clone());

    match &args.command {
        Commands::Scan => scan(&helper, &config, args.json),
        Commands::List { filters } => {
            let items = filters.to_filters().apply(helper.items()?);
            output::print_items(&items, filters.units.into(), args.json);
            Ok(())
        }
        Commands::Show { path } => {
            helper.load_gpx_items()?;
            if is_analysis_needed(path, helper.get_item(path).as_ref())
                && !helper.wait_until_read(config.reader.wait_timeout())
            {
                warn!("Timed out waiting for {}", path.display());
            }
            match helper.get_item(path) {
                Some(item) => {
                    output::print_item(&item, args.json);
                    Ok(())
                }
                None => bail!("no record for {}", path.display()),
            }
        }
        Commands::Rename { old, new } => rename(&helper, old, new),
        Commands::Remove { path } => {
            if !helper.remove(path)? {
                bail!("no record for {}", path.display());
            }
            println!("Removed {}", path.display());
            Ok(())
        }
        Commands::SetAppearance { path, appearance } => {
            helper.load_gpx_items()?;
            let Some(item) = helper.get_item(path) else {
                bail!("no record for {}", path.display());
            };
            let updated = appearance.apply(Appearance::from_item(&item))?;
            let item = helper.update_appearance(&item, &updated)?;
            output::print_item(&item, args.json);
            Ok(())
        }
        Commands::Stats => {
            let stats = output::Stats {
                cities: helper.nearest_city_list()?,
                colors: helper.track_colors_list()?,
                widths: helper.track_width_list()?,
                folders: helper.track_folders()?,
                min_create_date: helper.tracks_min_create_date()?,
                max_duration: helper.tracks_max_duration()?,
                split_tracks: helper.split_items()?.len(),
            };
            output::print_stats(&stats, args.json);
            Ok(())
        }
    }
}

fn scan(helper: &GpxDbHelper, config: &Config, json: bool) -> Result<()> {
    let stats = helper.load_gpx_items()?;
    let items = helper.items()?;

    let mut queued = 0usize;
    for item in &items {
        let cached = helper.get_item(item.file());
        if is_analysis_needed(item.file(), cached.as_ref()) {
            queued += 1;
        }
    }
    info!("Queued {} of {} tracks for analysis", queued, items.len());

    if !helper.wait_until_read(config.reader.wait_timeout()) {
        warn!(
            "Reader still busy with {:?} after {:?}, {} tracks left for the next scan",
            helper.current_read(),
            config.reader.wait_timeout(),
            helper.pending_reads()
        );
        helper.stop_reading();
    }

    let analysed = helper
        .items()?
        .iter()
        .filter(|item| item.data().contains(GpxParameter::Points))
        .count();
    output::print_scan(&stats, queued, analysed, json);
    Ok(())
}

fn rename(helper: &GpxDbHelper, old: &Path, new: &Path) -> Result<()> {
    if new.exists() {
        bail!("{} already exists", new.display());
    }
    if old.exists() {
        std::fs::rename(old, new)
            .with_context(|| format!("renaming {} to {}", old.display(), new.display()))?;
    }
    helper.rename(old, new)?;
    println!("Renamed {} -> {}", old.display(), new.display());
    Ok(())
}
