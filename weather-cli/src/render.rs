//! Plain-text rendering of a [`ViewState`].

use chrono::Local;
use std::fmt::{self, Display, Formatter};

use weather_core::{
    ForecastSeries, ViewState, WeatherSnapshot,
    view::{self, CurrentView, WindPressureView},
};

pub fn dashboard(state: &ViewState) -> String {
    Page(state).to_string()
}

/// The whole page, top to bottom.
struct Page<'a>(&'a ViewState);

impl Display for Page<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let state = self.0;

        if let Some(message) = &state.validation_message {
            writeln!(f, "! {message}")?;
        }
        if let Some(message) = &state.error {
            writeln!(f, "Error: {message}")?;
        }
        if state.location_error {
            writeln!(f, "(current location unavailable)")?;
        }

        if state.show_loading() {
            return writeln!(f, "Loading weather...");
        }

        let Some(snapshot) = &state.snapshot else {
            return writeln!(f, "Enter a city or use current location to see the weather");
        };

        current(f, snapshot, state.rain_chance())?;
        wind_pressure(f, snapshot)?;

        match &state.forecast {
            Some(series) => {
                hourly(f, series)?;
                daily(f, series)
            }
            None if state.is_forecast_loading => writeln!(f, "\nLoading forecast..."),
            None => Ok(()),
        }
    }
}

fn current(f: &mut Formatter<'_>, snapshot: &WeatherSnapshot, rain_chance: Option<f64>) -> fmt::Result {
    let card = CurrentView::new(snapshot, rain_chance);
    let now = Local::now();

    writeln!(f, "{}", card.title)?;
    writeln!(f, "{}", now.format("%A, %b %-d  %-I:%M %p"))?;
    writeln!(f, "{}°c  {}", card.temperature, card.description)?;
    writeln!(f, "Feels like {}°c", card.feels_like)?;
    if let Some(url) = &card.icon_url {
        writeln!(f, "Icon: {url}")?;
    }
    if let Some(rain) = card.rain_chance {
        writeln!(f, "Rain Chance: {rain}%")?;
    }
    writeln!(f, "Wind Speed: {} m/s", card.wind_speed)?;
    writeln!(f, "Humidity: {}%", card.humidity)?;
    writeln!(f, "Pressure: {} hPa", card.pressure)
}

fn wind_pressure(f: &mut Formatter<'_>, snapshot: &WeatherSnapshot) -> fmt::Result {
    let wp = WindPressureView::new(snapshot);

    writeln!(f, "\nWind & Pressure")?;
    writeln!(f, "  Wind: {} m/s, {} ({}°)", wp.speed, wp.direction, wp.degrees)?;
    if let Some(gust) = wp.gust {
        writeln!(f, "  Gust: {gust} m/s")?;
    }
    writeln!(f, "  Pressure: {} hPa", wp.pressure)?;
    if let Some(sea) = wp.sea_level {
        writeln!(f, "  Sea Level: {sea} hPa")?;
    }
    if let Some(ground) = wp.ground_level {
        writeln!(f, "  Ground Level: {ground} hPa")?;
    }
    Ok(())
}

fn hourly(f: &mut Formatter<'_>, series: &ForecastSeries) -> fmt::Result {
    writeln!(f, "\nHourly Forecast (24h)")?;
    for item in view::hourly_items(series) {
        write!(
            f,
            "  {:>5}  {:>4}°c  {}",
            view::hour_label(item.dt, &Local),
            item.temperature,
            item.description
        )?;
        if let Some(pop) = item.precipitation {
            write!(f, "  rain {pop}%")?;
        }
        writeln!(f)?;
    }
    Ok(())
}

fn daily(f: &mut Formatter<'_>, series: &ForecastSeries) -> fmt::Result {
    writeln!(f, "\n5-Day Forecast")?;
    for item in view::daily_items(series) {
        writeln!(
            f,
            "  {}  {:>4}°c / {:>4}°c  {}",
            view::weekday_label(item.dt, &Local),
            item.max,
            item.min,
            item.summary
        )?;
    }
    Ok(())
}
