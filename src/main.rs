use std::path::PathBuf;

use clap::Parser;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use place2nuts::{
    Capabilities, GeoLocation, NutsQuery, NutsRegion, PlaceQuery, PlaceResolver, Result, ServiceMode, Settings,
};

/// place2nuts: find the Eurostat NUTS region of a place
///
/// Geocodes each place and looks up the NUTS region containing it, either
/// online through GISCO or offline against a local NUTS dataset.
///
/// Examples:
///   place2nuts "Bremen, Germany"
///   place2nuts Florence Lyon --year 2016 --level 3
///   place2nuts --lat 53.08 --lon 8.80 --all-levels
///   place2nuts --mode offline --api-key KEY --boundary NUTS_RG_01M_2013_4326_LEVL_2.shp Bremen
///   place2nuts --location-only --json "Brussels, Belgium"
#[derive(Parser)]
#[command(name = "place2nuts", version, about, long_about = None)]
struct Cli {
    /// Places to resolve, e.g. "Bremen, Germany".
    places: Vec<String>,

    /// Latitude (-90 to 90), instead of a place name.
    #[arg(long, allow_hyphen_values = true)]
    lat: Option<f64>,

    /// Longitude (-180 to 180), instead of a place name.
    #[arg(long, allow_hyphen_values = true)]
    lon: Option<f64>,

    /// "online" (GISCO) or "offline" (Google geocoding plus a local boundary
    /// dataset). Overrides the config file and PLACE2NUTS_MODE.
    #[arg(long)]
    mode: Option<ServiceMode>,

    /// Geocoding API key (offline mode).
    #[arg(long)]
    api_key: Option<String>,

    /// NUTS boundary dataset (.shp or .geojson) for offline mode.
    #[arg(long)]
    boundary: Option<PathBuf>,

    /// GISCO service domain.
    #[arg(long)]
    domain: Option<String>,

    /// "http" or "https".
    #[arg(long)]
    protocol: Option<String>,

    /// Online geocoder: "gisco" or "nominatim".
    #[arg(long)]
    provider: Option<String>,

    /// NUTS nomenclature year.
    #[arg(long)]
    year: Option<u16>,

    /// NUTS level to report (0-3).
    #[arg(long, default_value_t = 2, value_parser = clap::value_parser!(u8).range(0..=3))]
    level: u8,

    /// Report every NUTS region containing the location instead of one level.
    /// Needed for offline datasets without a LEVL_CODE field.
    #[arg(long)]
    all_levels: bool,

    /// Request timeout in seconds.
    #[arg(long)]
    timeout: Option<u64>,

    /// Config file (defaults to <config_dir>/place2nuts/config.json).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Only geocode; skip the NUTS lookup.
    #[arg(long)]
    location_only: bool,

    /// Print results as JSON.
    #[arg(long)]
    json: bool,

    /// Debug logging on stderr.
    #[arg(long, short = 'v')]
    verbose: bool,
}

impl Cli {
    fn settings(&self) -> Settings {
        Settings {
            mode: self.mode.map(|m| m.to_string()),
            api_key: self.api_key.clone(),
            boundary_path: self.boundary.clone(),
            domain: self.domain.clone(),
            protocol: self.protocol.clone(),
            provider: self.provider.clone(),
            year: self.year,
            timeout_secs: self.timeout,
        }
    }

    /// Queries to run, each with the label it is reported under.
    fn queries(&self) -> Vec<(String, Result<PlaceQuery>)> {
        let mut queries: Vec<(String, Result<PlaceQuery>)> = self
            .places
            .iter()
            .map(|p| (p.clone(), PlaceQuery::place(p.as_str())))
            .collect();

        if self.lat.is_some() || self.lon.is_some() {
            let label = format!(
                "{}, {}",
                self.lat.map_or("?".to_string(), |v| v.to_string()),
                self.lon.map_or("?".to_string(), |v| v.to_string())
            );
            queries.push((label, Ok(PlaceQuery::Coordinates { lat: self.lat, lon: self.lon })));
        }
        queries
    }
}

#[derive(Serialize)]
struct Outcome {
    query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<GeoLocation>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    nuts: Vec<NutsRegion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_settings(cli: &Cli) -> Result<Settings> {
    let file = match &cli.config {
        Some(path) => Settings::load(path)?,
        None => Settings::load_default()?,
    };
    Ok(file.merge(Settings::from_env()?).merge(cli.settings()))
}

fn build_resolver(cli: &Cli) -> Result<PlaceResolver> {
    let config = load_settings(cli)?.into_config()?;
    tracing::debug!(?config, "Configuration loaded");
    PlaceResolver::new(config, Capabilities::probe())
}

fn run(resolver: &PlaceResolver, cli: &Cli, query: Result<PlaceQuery>) -> Result<(GeoLocation, Vec<NutsRegion>)> {
    let query = query?;
    let location = resolver.resolve_location(&query)?;
    if cli.location_only {
        return Ok((location, Vec::new()));
    }

    let nuts_query = NutsQuery::new(resolver.config().year);
    let nuts = if cli.all_levels {
        resolver.resolve_nuts_all(&location, &nuts_query)?
    } else {
        resolver
            .resolve_nuts_with(&location, &nuts_query.at_level(cli.level))?
            .into_iter()
            .collect()
    };
    Ok((location, nuts))
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let queries = cli.queries();
    if queries.is_empty() {
        eprintln!("Error: give at least one place, or --lat and --lon");
        std::process::exit(2);
    }

    let resolver = build_resolver(&cli).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    });

    let mut outcomes = Vec::with_capacity(queries.len());
    let mut failed = false;

    for (label, query) in queries {
        match run(&resolver, &cli, query) {
            Ok((location, nuts)) => {
                if !cli.json {
                    if cli.location_only {
                        println!("{} => {}", label, location);
                    } else if nuts.is_empty() {
                        println!("{} => no NUTS region at {}", label, location);
                    }
                    for region in &nuts {
                        println!("{} => {}", label, region);
                    }
                }
                outcomes.push(Outcome {
                    query: label,
                    location: Some(location),
                    nuts,
                    error: None,
                });
            }
            Err(e) => {
                failed = true;
                eprintln!("Error: {} => {}", label, e);
                outcomes.push(Outcome {
                    query: label,
                    location: None,
                    nuts: Vec::new(),
                    error: Some(e.to_string()),
                });
            }
        }
    }

    if cli.json {
        match serde_json::to_string_pretty(&outcomes) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
    }

    if failed {
        std::process::exit(1);
    }
}
