//! Skycast: weather for saved places, served from a local cache.

mod app;
mod error_mapping;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use skycast_core::{AppError, Config, TemperatureUnit};
use skycast_services::{PlaceOutcome, SyncResult};
use skycast_weather::{celsius_to_fahrenheit, Place, WeatherBundle, WeatherNow};

use crate::app::{location_unavailable, App};

/// Weather lookup with an offline-friendly local cache
#[derive(Parser)]
#[command(name = "skycast", version, about)]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// List saved places, primary first
    Places,
    /// Save a place by name or "lat,lon"
    Add {
        query: String,
        /// Which search result to save
        #[arg(long, default_value_t = 0)]
        pick: usize,
    },
    /// Remove a saved place and its cached weather
    Remove { id: String },
    /// Make a saved place the primary one
    Primary { id: String },
    /// Show weather for a saved place (primary by default)
    Weather {
        id: Option<String>,
        /// Bypass the cache
        #[arg(long)]
        refresh: bool,
        /// Show cached weather when the provider is unavailable
        #[arg(long)]
        stale_ok: bool,
    },
    /// Refresh stale places
    Sync {
        /// Refresh even fresh places
        #[arg(long)]
        force: bool,
        /// Keep syncing on the configured interval until interrupted
        #[arg(long)]
        daemon: bool,
    },
    /// Search for places without saving
    Search { query: String },
    /// Show the current location
    Here {
        /// Save it as a place
        #[arg(long)]
        save: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    skycast_core::init()?;

    // Validation failures abort here; warnings are logged by the loader
    let (config, _) = match &cli.config {
        Some(path) => Config::load_validated_from(path)?,
        None => Config::load_validated()?,
    };

    let app = App::from_config(config)?;
    app.ensure_default_place().await.map_err(report)?;

    let result = run(&app, cli.command.unwrap_or(Command::Weather {
        id: None,
        refresh: false,
        stale_ok: true,
    }))
    .await;

    app.shutdown();
    result.map_err(report)
}

fn report(e: AppError) -> anyhow::Error {
    tracing::debug!("{:?}", e);
    anyhow::anyhow!("{}", e.user_message())
}

async fn run(app: &App, command: Command) -> Result<(), AppError> {
    let unit = app.config().display.temperature_unit;

    match command {
        Command::Places => {
            let places = app.saved_places().await?;
            if places.is_empty() {
                println!("No saved places. Add one with `skycast add <name>`.");
            }
            for saved in places {
                let marker = if saved.is_primary { "*" } else { " " };
                println!("{} {:<22} {}", marker, saved.place.id, saved.place.name);
            }
        }
        Command::Add { query, pick } => {
            let place = match parse_coordinates(&query) {
                Some((lat, lon)) => Place::from_coordinates(query.trim(), lat, lon),
                None => {
                    let mut results = app.search_places(&query).await?;
                    if pick >= results.len() {
                        return Err(AppError::Weather(skycast_core::WeatherError::LocationNotFound(
                            format!("{} (result {})", query, pick),
                        )));
                    }
                    results.swap_remove(pick)
                }
            };
            app.add_place(place.clone()).await?;
            println!("Saved {} ({})", place.name, place.id);
        }
        Command::Remove { id } => {
            if app.remove_place(&id).await? {
                println!("Removed {}", id);
            } else {
                println!("No saved place {}", id);
            }
        }
        Command::Primary { id } => {
            app.set_primary(&id).await?;
            println!("Primary place is now {}", id);
        }
        Command::Weather { id, refresh, stale_ok } => {
            let Some(place) = app.resolve_place(id.as_deref()).await? else {
                return Err(match id {
                    Some(id) => AppError::Places(skycast_core::PlacesError::NotFound(id)),
                    None => location_unavailable(),
                });
            };
            let bundle = if stale_ok {
                app.weather_or_stale(&place, refresh).await?
            } else {
                app.weather_for(&place, refresh).await?
            };
            print_weather(&bundle, unit);
        }
        Command::Sync { force, daemon } => {
            if daemon {
                let sync = app.run_sync_loop();
                tokio::pin!(sync);
                let finished = tokio::select! {
                    result = &mut sync => Some(result),
                    _ = tokio::signal::ctrl_c() => None,
                };
                match finished {
                    Some(result) => result?,
                    None => {
                        app.shutdown();
                        sync.await?;
                    }
                }
            } else {
                print_sync_result(&app.sync_all(force).await?);
            }
        }
        Command::Search { query } => {
            for place in app.search_places(&query).await? {
                println!("{:<22} {}", place.id, place.name);
            }
        }
        Command::Here { save } => {
            let place = app.current_place().await.ok_or_else(location_unavailable)?;
            println!("{} ({})", place.name, place.id);
            if save {
                app.add_place(place.clone()).await?;
                match app.sync_place(&place, false).await? {
                    PlaceOutcome::Failure(e) => println!("Saved, but weather fetch failed: {}", e.user_message()),
                    _ => println!("Saved"),
                }
            }
        }
    }

    Ok(())
}

/// `"lat,lon"` within valid ranges.
fn parse_coordinates(input: &str) -> Option<(f64, f64)> {
    let (lat, lon) = input.split_once(',')?;
    let lat: f64 = lat.trim().parse().ok()?;
    let lon: f64 = lon.trim().parse().ok()?;
    ((-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon)).then_some((lat, lon))
}

fn format_temp(celsius: f64, unit: TemperatureUnit) -> String {
    match unit {
        TemperatureUnit::Celsius => format!("{:.0}°C", celsius),
        TemperatureUnit::Fahrenheit => format!("{:.0}°F", celsius_to_fahrenheit(celsius)),
    }
}

fn current_line(now: &WeatherNow, unit: TemperatureUnit) -> String {
    format!(
        "[{}] {} {} (feels like {}), humidity {}%, wind {:.0} km/h",
        now.condition.icon_name(),
        format_temp(now.temp_c, unit),
        now.condition.description(),
        format_temp(now.feels_like_c, unit),
        now.humidity,
        now.wind_kph
    )
}

fn print_weather(bundle: &WeatherBundle, unit: TemperatureUnit) {
    println!("{}", bundle.place.name);
    println!("  {}", current_line(&bundle.now, unit));

    if !bundle.hourly.is_empty() {
        println!("\n  Next hours");
        for hour in &bundle.hourly {
            println!(
                "    {}  {:>6}  {:.1} mm",
                hour.dt.format("%a %H:%M"),
                format_temp(hour.temp_c, unit),
                hour.precip_mm
            );
        }
    }

    if !bundle.daily.is_empty() {
        println!("\n  Next days");
        for day in &bundle.daily {
            println!(
                "    {}  {:>6} / {:>6}",
                day.dt.format("%a %d %b"),
                format_temp(day.min_c, unit),
                format_temp(day.max_c, unit)
            );
        }
    }
}

fn print_sync_result(result: &SyncResult) {
    match result {
        SyncResult::NoNetwork => println!("Offline, nothing synced"),
        SyncResult::NoPlaces => println!("No saved places"),
        SyncResult::NoDataToSync => println!("Everything is up to date"),
        SyncResult::Success(n) => println!("Synced {} places", n),
        SyncResult::PartialSuccess { success, failure } => {
            println!("Synced {} places, {} failed", success, failure)
        }
        SyncResult::Failure(reason) => println!("Sync failed: {}", reason),
    }
}
