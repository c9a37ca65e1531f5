use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use hospital_map_core::{
    compute_stats, load_hospitals_file, unique_countries, DateRange, ErrorHandler, FiltersPatch, LoadedHospitals,
    MapConfig, MapController, Stats, Status, Store, StoreState,
};
use hospital_map_render::{MapOptions, MapSession, RecordingBackend, RenderEngine, RenderStats};
use hospital_map_scheduler::GeoBounds;
use hospital_map_security::SecurityGate;
use hospital_map_storage::{FileStore, PreferenceStore, Preferences};
use serde::Serialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "hospital-map")]
#[command(about = "Headless driver for the hospital map engine")]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Filter a hospital file, render it against an in-memory map and print a JSON report.
    Render(RenderArgs),
    /// Print per-status counts and the countries present in a hospital file.
    Stats {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Print the sanitized form of a string.
    Sanitize {
        #[arg(value_name = "TEXT")]
        text: String,
    },
    /// Print CLI version.
    Version,
}

#[derive(Debug, Args)]
struct RenderArgs {
    #[arg(value_name = "FILE")]
    file: PathBuf,

    #[command(flatten)]
    filters: FilterArgs,

    /// Viewport as south,west,north,east
    #[arg(long, value_parser = parse_bounds, allow_hyphen_values = true)]
    bounds: Option<GeoBounds>,

    /// Hospital to highlight
    #[arg(long)]
    select: Option<String>,

    #[arg(long)]
    language: Option<String>,

    #[arg(long)]
    chunk_size: Option<usize>,

    #[arg(long)]
    max_markers: Option<usize>,

    /// JSON configuration file (defaults to HOSPITAL_MAP_* variables)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Restore and save preferences in this directory
    #[arg(long, value_name = "DIR")]
    prefs_dir: Option<PathBuf>,

    /// Include the ids of rendered markers in the report
    #[arg(long)]
    list: bool,
}

#[derive(Debug, Args)]
struct FilterArgs {
    #[arg(long)]
    continent: Option<String>,

    #[arg(long)]
    country: Option<String>,

    #[arg(long)]
    city: Option<String>,

    #[arg(long)]
    search: Option<String>,

    /// Repeatable; deployed, in-progress or signed
    #[arg(long = "status", value_parser = parse_status)]
    statuses: Vec<Status>,

    /// Earliest deployment date (YYYY-MM-DD)
    #[arg(long)]
    from: Option<NaiveDate>,

    /// Latest deployment date (YYYY-MM-DD)
    #[arg(long)]
    to: Option<NaiveDate>,
}

impl FilterArgs {
    fn to_patch(&self) -> FiltersPatch {
        let date_range = (self.from.is_some() || self.to.is_some()).then(|| {
            Some(DateRange {
                from: self.from,
                to: self.to,
            })
        });

        FiltersPatch {
            continent: self.continent.clone(),
            country: self.country.clone(),
            city: self.city.clone(),
            search_term: self.search.clone(),
            statuses: (!self.statuses.is_empty()).then(|| self.statuses.clone()),
            date_range,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RenderReport {
    total: usize,
    rejected: usize,
    language: String,
    stats: Stats,
    render: RenderStats,
    markers: usize,
    cluster_batches: Vec<usize>,
    frames: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    selected: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    marker_ids: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatsReport {
    stats: Stats,
    rejected: usize,
    countries: Vec<String>,
}

/// Install the stderr log subscriber (`RUST_LOG`, default `info`)
pub fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);

    match cli.command {
        Commands::Render(args) => run_render(&args),
        Commands::Stats { file } => run_stats(&file),
        Commands::Sanitize { text } => {
            println!("{}", SecurityGate::default().sanitize(&text));
            Ok(())
        }
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn run_render(args: &RenderArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => MapConfig::from_file(path)
            .with_context(|| format!("failed to read config {}", path.display()))?,
        None => MapConfig::from_env().context("invalid HOSPITAL_MAP_* environment")?,
    };
    if let Some(size) = args.chunk_size {
        config = config.with_chunk_size(size);
    }
    if let Some(max) = args.max_markers {
        config = config.with_max_markers(max);
    }

    let loaded = load(&args.file)?;
    let total = loaded.hospitals.len();
    let rejected = loaded.rejected.len();

    let gate = Arc::new(SecurityGate::new(config.security_config()));
    let errors = ErrorHandler::new();
    let store = Store::with_history_limit(StoreState::default(), Arc::clone(&gate), config.history_limit)
        .with_error_handler(errors.clone());
    let controller = MapController::new(store, errors.clone()).with_client_id("cli");
    controller.load_hospitals(loaded.hospitals);

    let preferences = args.prefs_dir.as_ref().map(|dir| PreferenceStore::new(FileStore::with_root(dir)));
    if let Some(prefs) = &preferences {
        if let Some(saved) = prefs.load().context("failed to read preferences")? {
            tracing::info!(language = %saved.language, "restoring preferences");
            controller.store().set_state(saved.to_patch(), false);
        }
    }

    let backend = RecordingBackend::new();
    if let Some(bounds) = args.bounds {
        backend.set_viewport(bounds);
    }
    let mut engine = RenderEngine::new(backend.clone(), config.clone(), gate, errors);
    engine
        .create_map(&MapOptions::default())
        .context("failed to create map")?;
    let session = MapSession::attach(controller.clone(), engine);

    controller.set_filters(args.filters.to_patch())?;
    if let Some(language) = &args.language {
        controller.set_language(language)?;
    }
    if let Some(id) = &args.select {
        controller
            .select_hospital(Some(id))
            .with_context(|| format!("cannot select {id}"))?;
    }

    let frames = drain(&session, &config);
    session.on_move_end();

    let state = controller.store().get_state();
    if let Some(prefs) = &preferences {
        prefs
            .save(&Preferences::from_state(&state))
            .context("failed to save preferences")?;
    }

    let report = RenderReport {
        total,
        rejected,
        language: state.language.clone(),
        stats: state.stats,
        render: session.with_engine(|e| e.stats()),
        markers: backend.marker_count(),
        cluster_batches: backend.cluster_batches(),
        frames,
        selected: state.ui.selected_hospital_id.clone(),
        marker_ids: args.list.then(|| backend.hospital_ids()),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Run frame and idle callbacks on a simulated clock until the queue is empty
fn drain(session: &MapSession<RecordingBackend>, config: &MapConfig) -> u32 {
    let mut now = Instant::now();
    let mut frames = 0;
    while !session.with_engine(|e| e.is_idle()) {
        if session.on_animation_frame(now) == 0 {
            session.on_idle(now);
        }
        now += config.chunk_delay;
        frames += 1;
    }
    frames
}

fn run_stats(file: &Path) -> Result<()> {
    let loaded = load(file)?;
    let report = StatsReport {
        stats: compute_stats(&loaded.hospitals, &loaded.hospitals),
        rejected: loaded.rejected.len(),
        countries: unique_countries(&loaded.hospitals),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn load(file: &Path) -> Result<LoadedHospitals> {
    let loaded = load_hospitals_file(file)
        .with_context(|| format!("failed to load hospitals from {}", file.display()))?;
    tracing::info!(
        file = %file.display(),
        loaded = loaded.hospitals.len(),
        rejected = loaded.rejected.len(),
        "hospitals loaded"
    );
    Ok(loaded)
}

fn parse_status(value: &str) -> Result<Status, String> {
    value.replace('-', " ").parse()
}

fn parse_bounds(value: &str) -> Result<GeoBounds, String> {
    let parts: Vec<f64> = value
        .split(',')
        .map(|p| p.trim().parse::<f64>().map_err(|e| format!("{p:?}: {e}")))
        .collect::<Result<_, _>>()?;
    match parts.as_slice() {
        [south, west, north, east] if south <= north && west <= east => {
            Ok(GeoBounds::new(*south, *west, *north, *east))
        }
        [_, _, _, _] => Err("bounds must satisfy south <= north and west <= east".to_string()),
        _ => Err("expected south,west,north,east".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bounds() {
        assert_eq!(parse_bounds("40,-10,60,20"), Ok(GeoBounds::new(40.0, -10.0, 60.0, 20.0)));
        assert!(parse_bounds("60,-10,40,20").is_err());
        assert!(parse_bounds("1,2,3").is_err());
        assert!(parse_bounds("a,b,c,d").is_err());
    }

    #[test]
    fn test_parse_status() {
        assert_eq!(parse_status("in-progress"), Ok(Status::InProgress));
        assert_eq!(parse_status("Signed"), Ok(Status::Signed));
        assert!(parse_status("pending").is_err());
    }

    #[test]
    fn test_empty_filter_args_change_nothing() {
        let args = FilterArgs {
            continent: None,
            country: None,
            city: None,
            search: None,
            statuses: Vec::new(),
            from: None,
            to: None,
        };
        assert_eq!(args.to_patch(), FiltersPatch::default());
    }

    #[test]
    fn test_date_args_build_range() {
        let args = FilterArgs {
            continent: None,
            country: None,
            city: None,
            search: None,
            statuses: Vec::new(),
            from: NaiveDate::from_ymd_opt(2023, 1, 1),
            to: None,
        };
        let patch = args.to_patch();
        assert_eq!(
            patch.date_range,
            Some(Some(DateRange {
                from: NaiveDate::from_ymd_opt(2023, 1, 1),
                to: None,
            }))
        );
    }
}
