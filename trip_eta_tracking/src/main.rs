use std::{fs::OpenOptions, path::{Path, PathBuf}, sync::Mutex, time::Duration};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use trip_eta_lib::{
    bearing, directions::directions, display::{format_distance, format_heading}, distance,
    estimate_time_of_arrival, estimator::MPS_TO_KMH, filter_nearby, GeoPoint,
};
use trip_eta_tracking::{
    history::HistoryManager, source::ReplaySource, LocationWatch, TrackerConfig, TripTracker,
    WatchMode,
};

#[derive(Parser)]
#[command(name = "trip_eta", about = "Distance, bearing and ETA for trip tracking")]
struct Cli {
    /// JSON config file; defaults are used for anything it leaves out.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Also write logs to this file.
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Great-circle distance in km.
    Distance {
        #[arg(long, value_parser = parse_point, allow_hyphen_values = true)]
        from: GeoPoint,
        #[arg(long, value_parser = parse_point, allow_hyphen_values = true)]
        to: GeoPoint,
    },
    /// Initial compass bearing in degrees.
    Bearing {
        #[arg(long, value_parser = parse_point, allow_hyphen_values = true)]
        from: GeoPoint,
        #[arg(long, value_parser = parse_point, allow_hyphen_values = true)]
        to: GeoPoint,
    },
    /// Travel time at a constant speed.
    Eta {
        #[arg(long, value_parser = parse_point, allow_hyphen_values = true)]
        from: GeoPoint,
        #[arg(long, value_parser = parse_point, allow_hyphen_values = true)]
        to: GeoPoint,
        /// Defaults to the configured fallback speed.
        #[arg(long, allow_hyphen_values = true)]
        speed_kmh: Option<f64>,
    },
    /// Points from a JSON file that lie within a radius of the center.
    Nearby {
        #[arg(long, value_parser = parse_point, allow_hyphen_values = true)]
        center: GeoPoint,
        #[arg(long)]
        radius_km: f64,
        #[arg(long)]
        points: PathBuf,
    },
    /// Straight-line directions.
    Directions {
        #[arg(long, value_parser = parse_point, allow_hyphen_values = true)]
        from: GeoPoint,
        #[arg(long, value_parser = parse_point, allow_hyphen_values = true)]
        to: GeoPoint,
    },
    /// Feed a recorded track through the tracker as if it were live.
    Replay {
        #[arg(long)]
        track: PathBuf,
        #[arg(long, default_value_t = 1)]
        trip_id: i64,
        #[arg(long, value_parser = parse_point, allow_hyphen_values = true)]
        destination: Option<GeoPoint>,
        /// Overrides the configured poll interval.
        #[arg(long)]
        interval_ms: Option<u64>,
        /// Keep the history file instead of closing the trip at the end.
        #[arg(long)]
        keep: bool,
    },
}

fn parse_point(value: &str) -> Result<GeoPoint, String> {
    let (lat, lon) = value
        .split_once(',')
        .ok_or_else(|| format!("expected LAT,LON, got {value:?}"))?;

    let latitude: f64 = lat.trim().parse().map_err(|err| format!("bad latitude {lat:?}: {err}"))?;
    let longitude: f64 = lon.trim().parse().map_err(|err| format!("bad longitude {lon:?}: {err}"))?;

    GeoPoint::new(latitude, longitude).map_err(|err| err.to_string())
}

fn read_points(path: &Path) -> anyhow::Result<Vec<GeoPoint>> {
    let file = std::fs::File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    let points: Vec<GeoPoint> = serde_json::from_reader(std::io::BufReader::new(file))
        .with_context(|| format!("Failed to parse points from {:?}", path))?;

    for point in &points {
        point.validate()?;
    }
    Ok(points)
}

fn init_logging(log_file: Option<&Path>) -> anyhow::Result<()> {
    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {:?}", path))?;
            Some(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| format!("{}=info,trip_eta_tracking=info", env!("CARGO_CRATE_NAME")).into())
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_file.as_deref())?;

    let config = match &cli.config {
        Some(path) => TrackerConfig::load(path)?,
        None => TrackerConfig::default(),
    };

    match cli.command {
        Command::Distance { from, to } => {
            println!("{}", format_distance(distance(&from, &to)));
        }
        Command::Bearing { from, to } => {
            let degrees = bearing(&from, &to);
            println!("{degrees:.1}° ({})", format_heading(Some(degrees)));
        }
        Command::Eta { from, to, speed_kmh } => {
            let speed_kmh = speed_kmh.unwrap_or(config.fallback_speed_kmh);
            let eta = estimate_time_of_arrival(&from, &to, speed_kmh / MPS_TO_KMH)?;
            println!(
                "{} in {:.2} h, arriving {}",
                format_distance(eta.distance_km),
                eta.time_in_hours,
                eta.eta_formatted
            );
        }
        Command::Nearby { center, radius_km, points } => {
            let points = read_points(&points)?;
            let nearby = filter_nearby(&center, &points, radius_km);
            tracing::info!("{} of {} points within {} km", nearby.len(), points.len(), radius_km);
            println!("{}", serde_json::to_string_pretty(&nearby)?);
        }
        Command::Directions { from, to } => {
            let directions = directions(&from, &to);
            println!("{}", serde_json::to_string_pretty(&directions)?);
        }
        Command::Replay { track, trip_id, destination, interval_ms, keep } => {
            replay(config, track, trip_id, destination, interval_ms, keep).await?;
        }
    }

    Ok(())
}

async fn replay(
    config: TrackerConfig,
    track: PathBuf,
    trip_id: i64,
    destination: Option<GeoPoint>,
    interval_ms: Option<u64>,
    keep: bool,
) -> anyhow::Result<()> {
    let points = read_points(&track)?;
    tracing::info!("Replaying {} points from {:?}", points.len(), track);

    let history = HistoryManager::start(config.history_dir()).await?;
    let tracker = TripTracker::new(history, config.clone());

    let interval = interval_ms.map(Duration::from_millis).unwrap_or(config.poll_interval());
    let mut options = config.sample_options();
    // A recorded track is old by definition
    options.maximum_age = Duration::MAX;

    let (watch, events) = LocationWatch::start(
        Box::new(ReplaySource::new(points)),
        WatchMode::Poll { interval },
        options,
        config.update_channel_capacity,
    );

    let mut updates = tracker.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match updates.recv().await {
                Ok(update) => {
                    let eta = update
                        .eta
                        .map(|eta| format!(", {} to go, ETA {}", format_distance(eta.distance_km), eta.eta_formatted))
                        .unwrap_or_default();
                    println!(
                        "{:.5}, {:.5}: travelled {}{}",
                        update.position.latitude,
                        update.position.longitude,
                        format_distance(update.travelled_km),
                        eta
                    );
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("Skipped {} updates", skipped);
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let recorded = tracker.run(trip_id, destination, events).await?;
    watch.stop().await;

    if !keep {
        let track = tracker.finish(trip_id).await?;
        println!("Trip {trip_id}: {recorded} samples, {} after cleaning", track.len());
    }

    drop(tracker);
    printer.await?;

    Ok(())
}
