use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use toolwire_core::{InputSchema, Property, ToolDescriptor, ToolError, ToolHandler, ToolOutput};

use super::HttpSource;
use crate::config::WeatherConfig;

pub const NAME: &str = "weather_current";

pub fn definition() -> ToolDescriptor {
    ToolDescriptor::new(
        NAME,
        "Get current weather conditions (temperature, wind, sky) for a coordinate",
        InputSchema::object()
            .required("latitude", Property::number("Latitude in decimal degrees (-90 to 90)"))
            .required(
                "longitude",
                Property::number("Longitude in decimal degrees (-180 to 180)"),
            )
            .optional(
                "units",
                Property::string("Temperature unit")
                    .one_of(["celsius", "fahrenheit"])
                    .with_default("celsius"),
            ),
    )
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    current_weather: Option<CurrentWeather>,
}

#[derive(Debug, Deserialize)]
struct CurrentWeather {
    temperature: f64,
    windspeed: f64,
    winddirection: Option<f64>,
    weathercode: Option<i64>,
    time: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WeatherArgs {
    latitude: f64,
    longitude: f64,
    units: String,
}

pub struct WeatherTool {
    http: HttpSource,
    base_url: String,
}

impl WeatherTool {
    pub fn new(http: HttpSource, config: &WeatherConfig) -> Self {
        Self {
            http,
            base_url: config.base_url.clone(),
        }
    }
}

#[async_trait]
impl ToolHandler for WeatherTool {
    async fn call(&self, arguments: Value) -> Result<ToolOutput, ToolError> {
        let args: WeatherArgs = serde_json::from_value(arguments)?;

        if !(-90.0..=90.0).contains(&args.latitude) {
            return Err(ToolError::invalid("'latitude' must be between -90 and 90"));
        }
        if !(-180.0..=180.0).contains(&args.longitude) {
            return Err(ToolError::invalid("'longitude' must be between -180 and 180"));
        }

        let request = self.http.get(&self.base_url).query(&[
            ("latitude", args.latitude.to_string()),
            ("longitude", args.longitude.to_string()),
            ("current_weather", "true".to_string()),
            ("temperature_unit", args.units.clone()),
        ]);

        let response: ForecastResponse = self.http.fetch_json(request).await?;
        let current = response
            .current_weather
            .ok_or_else(|| ToolError::upstream("response has no current_weather block"))?;

        Ok(ToolOutput::text(format_weather(&args, &current)))
    }
}

fn format_weather(args: &WeatherArgs, current: &CurrentWeather) -> String {
    let unit = if args.units == "fahrenheit" { "°F" } else { "°C" };

    let mut output = format!("Current weather at {}, {}", args.latitude, args.longitude);
    if let Some(time) = &current.time {
        output.push_str(&format!(" ({})", time));
    }
    output.push('\n');

    output.push_str(&format!("Temperature: {:.1}{}\n", current.temperature, unit));
    match current.winddirection {
        Some(dir) => output.push_str(&format!(
            "Wind: {:.1} km/h from {:.0}°\n",
            current.windspeed, dir
        )),
        None => output.push_str(&format!("Wind: {:.1} km/h\n", current.windspeed)),
    }
    if let Some(code) = current.weathercode {
        output.push_str(&format!("Conditions: {} (code {})", describe_code(code), code));
    }

    output.trim_end().to_string()
}

/// WMO weather interpretation codes.
fn describe_code(code: i64) -> &'static str {
    match code {
        0 => "Clear sky",
        1 => "Mainly clear",
        2 => "Partly cloudy",
        3 => "Overcast",
        45 | 48 => "Fog",
        51 | 53 | 55 => "Drizzle",
        56 | 57 => "Freezing drizzle",
        61 | 63 | 65 => "Rain",
        66 | 67 => "Freezing rain",
        71 | 73 | 75 => "Snow",
        77 => "Snow grains",
        80..=82 => "Rain showers",
        85 | 86 => "Snow showers",
        95 => "Thunderstorm",
        96 | 99 => "Thunderstorm with hail",
        _ => "Unknown",
    }
}
