//! CLI entry point for the location listener.
//!
//! Provides subcommands for polling ZTM vehicle positions and timetables,
//! geocoding addresses, measuring distances and reading a serial GPS.

use anyhow::{Result, bail};
use clap::{Args, Parser, Subcommand};
use location_listener::{
    config::Settings,
    fetch::BasicClient,
    geo::{IpLocator, MapApi, NominatimClient},
    gps::{DEFAULT_BAUD_RATE, DEFAULT_SERIAL_PORT, get_gps_location},
    output::{append_record, print_json, save_batches_to_csv, save_to_csv},
    ztm::{StopRef, VehicleType, ZtmClient, build_api_url_ztm},
};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "location_listener")]
#[command(about = "Collects transit, geocoding and GPS location data", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll positions of all vehicles on a line
    Vehicles {
        #[command(flatten)]
        poll: VehiclePoll,

        /// Save the collected batches as CSV under this name
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Poll only the coordinates of the vehicles on a line
    Positions {
        #[command(flatten)]
        poll: VehiclePoll,

        /// Save the collected points as CSV under this name
        #[arg(short, long, conflicts_with = "append")]
        output: Option<String>,

        /// Append the collected points to this CSV file
        #[arg(short, long)]
        append: Option<PathBuf>,
    },
    /// Poll the timetable of a line at a stop post
    Schedule {
        /// Line number, e.g. 523
        line: String,

        /// Stop post number, e.g. 01
        stop_nr: String,

        #[command(flatten)]
        stop: StopArgs,

        /// Number of calls
        #[arg(short = 'n', long, default_value_t = 1)]
        amount: usize,

        /// Save the rides as CSV under this name
        #[arg(short, long)]
        output: Option<String>,
    },
    /// List the lines serving a stop post
    Lines {
        /// Stop post number, e.g. 01
        stop_nr: String,

        #[command(flatten)]
        stop: StopArgs,
    },
    /// Print a keyed ZTM API URL
    Url {
        #[arg(long, default_value = "")]
        line: String,

        /// 1 for bus, 2 for tram
        #[arg(short = 't', long, default_value_t = 1)]
        vehicle_type: u8,

        #[arg(long)]
        brigade: Option<String>,

        #[arg(long)]
        stop_id: Option<String>,
    },
    /// Look up coordinates for an address
    Geocode { address: String },
    /// Look up the address at a coordinate
    Reverse {
        #[arg(allow_hyphen_values = true)]
        latitude: f64,
        #[arg(allow_hyphen_values = true)]
        longitude: f64,
    },
    /// Distance between two addresses
    Distance {
        origin: String,
        destination: String,

        /// Measure units: km or m
        #[arg(short, long, default_value = "km")]
        unit: String,
    },
    /// Read one GPGGA fix from a serial GPS receiver
    Gps {
        #[arg(short, long, default_value = DEFAULT_SERIAL_PORT)]
        port: String,

        #[arg(short, long, default_value_t = DEFAULT_BAUD_RATE)]
        baud_rate: u32,

        /// Read timeout in seconds
        #[arg(short, long, default_value_t = 10)]
        timeout: u64,

        /// Append the fix to this CSV file
        #[arg(short, long)]
        append: Option<PathBuf>,
    },
    /// Approximate location of this machine from its public IP
    WhereAmI,
}

#[derive(Args)]
struct VehiclePoll {
    /// Line number, e.g. 512
    line: String,

    /// 1 for bus, 2 for tram
    #[arg(short = 't', long, default_value_t = 1)]
    vehicle_type: u8,

    /// Number of calls
    #[arg(short = 'n', long, default_value_t = 1)]
    amount: usize,
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct StopArgs {
    /// Stop group id, e.g. 7009
    #[arg(long)]
    stop_id: Option<String>,

    /// Stop name, e.g. "pl. Bankowy"
    #[arg(long)]
    stop_name: Option<String>,
}

impl StopArgs {
    fn into_ref(self) -> Result<StopRef> {
        match (self.stop_id, self.stop_name) {
            (Some(id), _) => Ok(StopRef::Id(id)),
            (None, Some(name)) => Ok(StopRef::Name(name)),
            (None, None) => bail!("either --stop-id or --stop-name is required"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    let settings = Settings::from_env()?;
    let _file_guard = init_logging(&settings)?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Vehicles { poll, output } => {
            let Some(vehicle_type) = vehicle_type(poll.vehicle_type) else {
                return Ok(());
            };
            let ztm = ZtmClient::new(BasicClient::new()?, &settings.api)?;
            let data = ztm
                .get_vehicles_location_data(&poll.line, vehicle_type, poll.amount)
                .await;

            info!(batches = data.len(), "Vehicle polling finished");
            match output {
                Some(name) => {
                    save_batches_to_csv(&data, &name, &settings.export.directory);
                }
                None => print_json(&data)?,
            }
        }
        Commands::Positions {
            poll,
            output,
            append,
        } => {
            let Some(vehicle_type) = vehicle_type(poll.vehicle_type) else {
                return Ok(());
            };
            let ztm = ZtmClient::new(BasicClient::new()?, &settings.api)?;
            let points = ztm
                .get_lat_lon_for_vehicle(&poll.line, vehicle_type, poll.amount)
                .await;

            match (output, append) {
                (Some(name), _) => {
                    save_to_csv(&points, &name, &settings.export.directory);
                }
                (None, Some(path)) => {
                    for point in &points {
                        append_record(&path, point)?;
                    }
                    info!(points = points.len(), "Appended to {}", path.display());
                }
                (None, None) => print_json(&points)?,
            }
        }
        Commands::Schedule {
            line,
            stop_nr,
            stop,
            amount,
            output,
        } => {
            let ztm = ZtmClient::new(BasicClient::new()?, &settings.api)?;
            let schedules = ztm
                .get_stop_schedule_data(&line, &stop_nr, amount, &stop.into_ref()?)
                .await;

            match output {
                Some(name) => {
                    let rows: Vec<_> = schedules.iter().map(|s| s.ride_rows()).collect();
                    save_batches_to_csv(&rows, &name, &settings.export.directory);
                }
                None => print_json(&schedules)?,
            }
        }
        Commands::Lines { stop_nr, stop } => {
            let ztm = ZtmClient::new(BasicClient::new()?, &settings.api)?;
            if let Some(lines) = ztm.get_lines_for_bus_stop(&stop_nr, &stop.into_ref()?).await {
                print_json(&lines)?;
            }
        }
        Commands::Url {
            line,
            vehicle_type: code,
            brigade,
            stop_id,
        } => {
            let Some(vehicle_type) = vehicle_type(code) else {
                return Ok(());
            };
            if let Some(url) = build_api_url_ztm(
                &settings.api.api_urls,
                settings.api.api_keys.ztm_key.as_deref(),
                vehicle_type,
                &line,
                brigade.as_deref(),
                stop_id.as_deref(),
            ) {
                info!(%url, "ZTM API URL");
            }
        }
        Commands::Geocode { address } => {
            if let Some(place) = map_api(&settings)?.get_geocode_data(&address).await {
                print_json(&place)?;
            }
        }
        Commands::Reverse {
            latitude,
            longitude,
        } => {
            if let Some(place) = map_api(&settings)?
                .get_reverse_geocode_data(latitude, longitude)
                .await
            {
                print_json(&place)?;
            }
        }
        Commands::Distance {
            origin,
            destination,
            unit,
        } => {
            if let Some(distance) = map_api(&settings)?
                .get_distance(&origin, &destination, &unit)
                .await
            {
                info!(%origin, %destination, distance, unit = %unit, "Distance");
            }
        }
        Commands::Gps {
            port,
            baud_rate,
            timeout,
            append,
        } => {
            let fix = tokio::task::spawn_blocking(move || {
                get_gps_location(&port, baud_rate, Duration::from_secs(timeout))
            })
            .await?;

            match fix {
                Some(fix) => {
                    let (lat, lon) = fix.to_decimal_degrees();
                    info!(lat, lon, "GPS fix in decimal degrees");
                    match append {
                        Some(path) => append_record(&path, &fix)?,
                        None => print_json(&fix)?,
                    }
                }
                None => warn!("No GPS fix"),
            }
        }
        Commands::WhereAmI => {
            let locator = IpLocator::new(BasicClient::new()?, &settings.api.api_urls.ipinfo_url);
            if let Some(location) = locator.get_location_of_the_client_request().await {
                print_json(&location)?;
            }
        }
    }

    Ok(())
}

/// Colored stderr + JSON rolling log file. The returned guard flushes the
/// file writer on drop.
fn init_logging(settings: &Settings) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| settings.logging.file_path.clone());
    let log_file_path = PathBuf::from(log_file_path);
    let log_dir = log_file_path.parent().unwrap_or(Path::new("logs"));
    let log_file_name = log_file_path
        .file_name()
        .unwrap_or(OsStr::new("location_listener.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    Ok(file_guard)
}

fn vehicle_type(code: u8) -> Option<VehicleType> {
    use location_listener::guard::OrLog;
    VehicleType::try_from(code).or_log("vehicle_type")
}

fn map_api(settings: &Settings) -> Result<MapApi<NominatimClient<BasicClient>>> {
    let geocoder = NominatimClient::new(BasicClient::new()?, &settings.api.api_urls.nominatim_url)?;
    Ok(MapApi::new(geocoder))
}
