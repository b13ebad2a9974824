use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use inquire::{Confirm, Select, Text};
use std::sync::Arc;
use tracing::debug;

use weather_core::{
    Config, Dashboard, FileStore, LocationSource, Orchestrator, Query,
    geolocation::geolocator_from_config,
    provider::source_from_config,
    query::validate_city,
};

use crate::render;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather", version, about = "Weather dashboard")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configure the endpoint, provider key and location source.
    Configure,

    /// Show the dashboard once and exit.
    Show {
        /// City name; when absent the last search or the current location is used.
        city: Option<String>,

        #[command(flatten)]
        opts: SourceOpts,
    },

    /// Interactive dashboard: search cities, use location, refresh.
    Watch {
        #[command(flatten)]
        opts: SourceOpts,
    },
}

#[derive(Debug, Args)]
pub struct SourceOpts {
    /// Latitude (requires --lon).
    #[arg(long, requires = "lon", allow_hyphen_values = true)]
    lat: Option<f64>,

    /// Longitude (requires --lat).
    #[arg(long, requires = "lat", allow_hyphen_values = true)]
    lon: Option<f64>,

    /// Call OpenWeather directly with the local API key instead of the endpoint.
    #[arg(long)]
    direct: bool,
}

impl SourceOpts {
    fn coordinates(&self) -> Option<Query> {
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => Some(Query::coordinates(lat, lon)),
            _ => None,
        }
    }
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Command::Configure => configure(),
            Command::Show { city, opts } => show(city, &opts).await,
            Command::Watch { opts } => watch(&opts).await,
        }
    }
}

fn build_dashboard(config: &Config, opts: &SourceOpts) -> Result<Dashboard> {
    debug!(direct = opts.direct, endpoint = %config.endpoint_url(), "building dashboard");
    let source = source_from_config(config, opts.direct)?;
    let store = Arc::new(FileStore::new(Config::last_search_path()?));
    let orchestrator = Arc::new(Orchestrator::new(source, store));

    Ok(Dashboard::new(orchestrator, geolocator_from_config(config)))
}

async fn show(city: Option<String>, opts: &SourceOpts) -> Result<()> {
    let preloaded = match city {
        Some(raw) => match validate_city(&raw)? {
            Some(city) => Some(Query::city(city)),
            None => None,
        },
        None => opts.coordinates(),
    };

    let config = Config::load()?;
    let mut dashboard = build_dashboard(&config, opts)?;

    dashboard.start(preloaded);
    dashboard.settle().await;

    let state = dashboard.state();
    println!("{}", render::dashboard(state));

    if let Some(message) = &state.error {
        bail!("{message}");
    }

    Ok(())
}

const HELP: &str = "Enter a city, `:loc` for current location, `:r` to refresh, `:q` to quit.";

async fn watch(opts: &SourceOpts) -> Result<()> {
    let config = Config::load()?;
    let mut dashboard = build_dashboard(&config, opts)?;

    dashboard.start(opts.coordinates());
    dashboard.settle().await;

    loop {
        println!("{}", render::dashboard(dashboard.state()));
        if dashboard.state().error.is_some() {
            // shown once; the next input dismisses it
            dashboard.dismiss_error();
        }

        let input = Text::new("Search city:")
            .with_help_message(HELP)
            .prompt()
            .context("Failed to read input")?;

        match input.trim() {
            ":q" | ":quit" => break,
            ":loc" => dashboard.locate(),
            ":r" => {
                if let Some(query) = dashboard.state().current_query.clone() {
                    dashboard.dispatch(weather_core::Event::QueryChanged(query));
                }
            }
            other => dashboard.search(other),
        }

        dashboard.settle().await;
    }

    Ok(())
}

fn configure() -> Result<()> {
    let mut config = Config::load()?;

    let endpoint = Text::new("Forwarding endpoint URL:")
        .with_default(&config.endpoint_url())
        .prompt()
        .context("Failed to read endpoint URL")?;
    config.endpoint_url = Some(endpoint.trim().to_string());

    let change_key = match config.file_api_key() {
        Some(_) => Confirm::new("Replace the stored OpenWeather API key?")
            .with_default(false)
            .prompt()
            .context("Failed to read answer")?,
        None => true,
    };
    if change_key {
        let key = Text::new("OpenWeather API key (empty to skip):")
            .prompt()
            .context("Failed to read API key")?;
        if !key.trim().is_empty() {
            config.set_api_key(key.trim().to_string());
        }
    }

    let sources = vec!["ip", "fixed", "off"];
    let source = Select::new("Location source:", sources)
        .prompt()
        .context("Failed to read location source")?;

    config.location.source = match source {
        "fixed" => {
            config.location.lat = Some(prompt_coordinate("Latitude:")?);
            config.location.lon = Some(prompt_coordinate("Longitude:")?);
            LocationSource::Fixed
        }
        "off" => LocationSource::Off,
        _ => LocationSource::Ip,
    };

    config.save()?;
    println!("Configuration saved to {}", Config::config_file_path()?.display());

    Ok(())
}

fn prompt_coordinate(label: &str) -> Result<f64> {
    let raw = Text::new(label).prompt().context("Failed to read coordinate")?;
    let value: f64 = raw
        .trim()
        .parse()
        .with_context(|| format!("'{}' is not a number", raw.trim()))?;
    if !value.is_finite() {
        bail!("'{}' is not a finite number", raw.trim());
    }
    Ok(value)
}
