//! Powderline: BC ski weather, avalanche and road conditions from the terminal.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;

use powderline_core::Config;
use powderline_dashboard::{render, Dashboard};
use powderline_services::{within_radius, Coordinates};
use powderline_weather::{catalog, resolve, Location, LocationKind};

/// How many catalog entries `nearest` lists.
const NEAREST_COUNT: usize = 5;

/// Powderline: ski weather, avalanche danger and road events for BC
#[derive(Parser, Debug)]
#[command(name = "powderline", version)]
#[command(about = "Ski weather, avalanche danger and road events for BC mountains")]
struct Args {
    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Config file (defaults to $POWDERLINE_CONFIG or the user config dir)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Weather, avalanche and road report for one location
    Report {
        /// Catalog id or name, or "lat,lon"
        location: Option<String>,
    },
    /// Rank catalog locations by incoming powder
    Powder {
        #[arg(long, value_enum)]
        kind: Option<KindArg>,
    },
    /// List catalog locations
    Locations,
    /// Catalog locations closest to a point
    Nearest {
        #[arg(allow_negative_numbers = true)]
        lat: f64,
        #[arg(allow_negative_numbers = true)]
        lon: f64,
        /// Only list locations within this many km
        #[arg(long, value_name = "KM")]
        radius: Option<f64>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum KindArg {
    Resort,
    Backcountry,
    Pass,
}

impl From<KindArg> for LocationKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Resort => LocationKind::Resort,
            KindArg::Backcountry => LocationKind::Backcountry,
            KindArg::Pass => LocationKind::Pass,
        }
    }
}

#[derive(Serialize)]
struct NearbyLocation<'a> {
    location: &'a Location,
    distance_km: f64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    powderline_core::init(if args.quiet { "warn" } else { "info" })?;

    match args.command {
        Command::Locations => {
            if args.json {
                print_json(catalog())?;
            } else {
                println!("{}", render::render_locations(catalog()));
            }
        }
        Command::Nearest { lat, lon, radius } => {
            let point = Coordinates::new(lat, lon);
            if !point.is_valid() {
                bail!("{} is not a valid latitude/longitude", point);
            }
            let nearby = nearest_locations(point, radius.unwrap_or(f64::INFINITY));
            if args.json {
                print_json(&nearby)?;
            } else {
                for n in &nearby {
                    println!("{:>6.1} km  {} ({})", n.distance_km, n.location.name, n.location.id);
                }
            }
        }
        Command::Report { location } => {
            let (config, _) = Config::load_validated(args.config.as_deref())?;
            let query = location.unwrap_or_else(|| config.defaults.location.clone());
            let location = resolve(&query).with_context(|| format!("Cannot resolve {:?}", query))?;

            let dashboard = Dashboard::from_config(&config)?;
            let report = dashboard.report(&location).await;
            if args.json {
                print_json(&report)?;
            } else {
                println!("{}", render::render_report(&report));
            }
        }
        Command::Powder { kind } => {
            let (config, _) = Config::load_validated(args.config.as_deref())?;
            let kind = kind.map(LocationKind::from);
            let locations: Vec<Location> = catalog()
                .iter()
                .filter(|l| kind.map_or(true, |k| l.kind == k))
                .cloned()
                .collect();

            let dashboard = Dashboard::from_config(&config)?;
            let ranking = dashboard.powder_ranking(&locations).await;
            if args.json {
                print_json(&ranking)?;
            } else {
                println!("{}", render::render_ranking(&ranking));
            }
        }
    }

    Ok(())
}

fn nearest_locations(point: Coordinates, radius_km: f64) -> Vec<NearbyLocation<'static>> {
    within_radius(point, catalog(), radius_km)
        .into_iter()
        .take(NEAREST_COUNT)
        .map(|(location, distance_km)| NearbyLocation {
            location,
            distance_km,
        })
        .collect()
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", json);
    Ok(())
}
