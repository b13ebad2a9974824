//! Display values derived from provider data.

use chrono::{DateTime, TimeZone};

use crate::{ForecastEntry, ForecastSeries, WeatherSnapshot};

pub const ICON_BASE_URL: &str = "https://openweathermap.org/img/wn";

const DIRECTIONS: [&str; 8] = ["N", "NE", "E", "SE", "S", "SW", "W", "NW"];

/// Round half up, the way the temperatures are shown (28.5 → 29, -2.5 → -2).
pub fn round_half_up(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

/// Eight-point compass label for a wind bearing in degrees.
pub fn cardinal_direction(deg: f64) -> &'static str {
    let index = round_half_up(deg / 45.0).rem_euclid(8) as usize;
    DIRECTIONS[index]
}

pub fn icon_url(code: &str) -> String {
    format!("{ICON_BASE_URL}/{code}.png")
}

pub fn large_icon_url(code: &str) -> String {
    format!("{ICON_BASE_URL}/{code}@4x.png")
}

/// `0.35` → `35`.
pub fn percent(probability: f64) -> i64 {
    round_half_up(probability * 100.0)
}

/// One entry per day: the one stamped at noon.
pub fn daily(series: &ForecastSeries) -> Vec<&ForecastEntry> {
    series.list.iter().filter(|e| e.dt_txt.contains("12:00:00")).collect()
}

/// Every entry, in provider order.
pub fn hourly(series: &ForecastSeries) -> &[ForecastEntry] {
    &series.list
}

/// `9 AM`, `12 PM`, ... in the given zone.
pub fn hour_label<Tz: TimeZone>(dt: i64, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    match DateTime::from_timestamp(dt, 0) {
        Some(utc) => utc.with_timezone(tz).format("%-I %p").to_string(),
        None => "--".to_string(),
    }
}

/// `Mon`, `Tue`, ... in the given zone.
pub fn weekday_label<Tz: TimeZone>(dt: i64, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    match DateTime::from_timestamp(dt, 0) {
        Some(utc) => utc.with_timezone(tz).format("%a").to_string(),
        None => "--".to_string(),
    }
}

/// Main card: location, temperatures and the headline details.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentView {
    pub title: String,
    pub temperature: i64,
    pub feels_like: i64,
    pub description: String,
    pub icon_url: Option<String>,
    pub humidity: f64,
    pub wind_speed: f64,
    pub pressure: f64,
    /// Percent, present only when a forecast is known.
    pub rain_chance: Option<i64>,
}

impl CurrentView {
    pub fn new(snapshot: &WeatherSnapshot, rain_chance: Option<f64>) -> Self {
        let condition = snapshot.primary_condition();
        let title = if snapshot.sys.country.is_empty() {
            snapshot.name.clone()
        } else {
            format!("{}, {}", snapshot.name, snapshot.sys.country)
        };

        Self {
            title,
            temperature: round_half_up(snapshot.main.temp),
            feels_like: round_half_up(snapshot.main.feels_like),
            description: condition.map(|c| c.description.clone()).unwrap_or_default(),
            icon_url: condition.map(|c| large_icon_url(&c.icon)),
            humidity: snapshot.main.humidity,
            wind_speed: snapshot.wind.speed,
            pressure: snapshot.main.pressure,
            rain_chance: rain_chance.map(percent),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WindPressureView {
    pub speed: f64,
    /// Missing bearings read as 0.
    pub degrees: f64,
    pub direction: &'static str,
    pub gust: Option<f64>,
    pub pressure: f64,
    pub sea_level: Option<f64>,
    pub ground_level: Option<f64>,
}

impl WindPressureView {
    pub fn new(snapshot: &WeatherSnapshot) -> Self {
        let degrees = snapshot.wind.deg.unwrap_or(0.0);
        Self {
            speed: snapshot.wind.speed,
            degrees,
            direction: cardinal_direction(degrees),
            gust: snapshot.wind.gust,
            pressure: snapshot.main.pressure,
            sea_level: snapshot.main.sea_level,
            ground_level: snapshot.main.grnd_level,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HourlyItem {
    pub dt: i64,
    pub temperature: i64,
    pub icon_url: Option<String>,
    pub description: String,
    /// Shown only when above zero.
    pub precipitation: Option<i64>,
}

impl From<&ForecastEntry> for HourlyItem {
    fn from(entry: &ForecastEntry) -> Self {
        let condition = entry.weather.first();
        Self {
            dt: entry.dt,
            temperature: round_half_up(entry.main.temp),
            icon_url: condition.map(|c| icon_url(&c.icon)),
            description: condition.map(|c| c.description.clone()).unwrap_or_default(),
            precipitation: (entry.pop > 0.0).then(|| percent(entry.pop)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DailyItem {
    pub dt: i64,
    pub max: i64,
    pub min: i64,
    pub icon_url: Option<String>,
    /// Short category, e.g. `Clouds`.
    pub summary: String,
}

impl From<&ForecastEntry> for DailyItem {
    fn from(entry: &ForecastEntry) -> Self {
        let condition = entry.weather.first();
        Self {
            dt: entry.dt,
            max: round_half_up(entry.main.temp_max),
            min: round_half_up(entry.main.temp_min),
            icon_url: condition.map(|c| icon_url(&c.icon)),
            summary: condition.map(|c| c.main.clone()).unwrap_or_default(),
        }
    }
}

pub fn hourly_items(series: &ForecastSeries) -> Vec<HourlyItem> {
    hourly(series).iter().map(HourlyItem::from).collect()
}

pub fn daily_items(series: &ForecastSeries) -> Vec<DailyItem> {
    daily(series).into_iter().map(DailyItem::from).collect()
}
