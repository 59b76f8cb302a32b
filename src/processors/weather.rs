//! OpenWeather post-processor
//!
//! Builds "<condition> in <keyword>" titles from current-weather responses
//! (https://openweathermap.org/current), appends the temperature with a
//! decimal comma, and links to the OpenWeather city search.

use serde_json::Value;

use super::PostProcessor;
use crate::http_client::form_encode;
use crate::json_path::{resolve, resolve_text};
use crate::normalizer::DEFAULT_IMAGE_URL_TEMPLATE;
use crate::schemas::AggregatedResult;

const FIND_URL: &str = "https://openweathermap.org/find?q=";

#[derive(Debug, Clone, Copy, Default)]
pub struct WeatherPostProcessor;

impl PostProcessor for WeatherPostProcessor {
    fn name(&self) -> &'static str {
        "WeatherPostProcessor"
    }

    fn process(&self, mut result: AggregatedResult, item: &Value, keyword: &str) -> AggregatedResult {
        // Non-string values are rendered as their JSON text
        let condition = resolve_text(item, Some("weather[0].main")).unwrap_or_default();
        let description = resolve_text(item, Some("weather[0].description")).unwrap_or_default();
        let icon = resolve_text(item, Some("weather[0].icon")).filter(|icon| !icon.trim().is_empty());

        result.title = format!("{} in {}", condition, keyword);
        result.description = description;

        if let Some(temp) = resolve(item, "main.temp").and_then(Value::as_f64) {
            result.description.push_str(&format!(" ({}°C)", format_temperature(temp)));
        }

        result.image_url = icon.map(|icon| DEFAULT_IMAGE_URL_TEMPLATE.replace("{value}", icon.trim()));
        result.url = format!("{}{}", FIND_URL, form_encode(keyword));

        result
    }
}

/// At most one decimal, trailing zero dropped, decimal comma: 21.46 -> "21,5", 20.0 -> "20"
fn format_temperature(temp: f64) -> String {
    // adding 0.0 turns -0.0 into 0.0
    let rounded = (temp * 10.0).round() / 10.0 + 0.0;
    if rounded.fract() == 0.0 {
        format!("{:.0}", rounded)
    } else {
        format!("{:.1}", rounded).replace('.', ",")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn normalized() -> AggregatedResult {
        AggregatedResult {
            source: "OpenWeather".to_string(),
            title: "Athens".to_string(),
            description: String::new(),
            url: String::new(),
            image_url: None,
            date: Utc::now(),
        }
    }

    #[test]
    fn test_full_weather_item() {
        let item = json!({
            "name": "Athens",
            "weather": [{ "main": "Clear", "description": "clear sky", "icon": "01d" }],
            "main": { "temp": 21.46 }
        });

        let result = WeatherPostProcessor.process(normalized(), &item, "New York");
        assert_eq!(result.title, "Clear in New York");
        assert_eq!(result.description, "clear sky (21,5°C)");
        assert_eq!(
            result.image_url.as_deref(),
            Some("https://openweathermap.org/img/wn/01d@2x.png")
        );
        assert_eq!(result.url, "https://openweathermap.org/find?q=New+York");
        assert_eq!(result.source, "OpenWeather");
    }

    #[test]
    fn test_missing_weather_block() {
        let result = WeatherPostProcessor.process(normalized(), &json!({ "name": "Nowhere" }), "Nowhere");
        assert_eq!(result.title, " in Nowhere");
        assert_eq!(result.description, "");
        assert_eq!(result.image_url, None);
        assert_eq!(result.url, "https://openweathermap.org/find?q=Nowhere");
    }

    #[test]
    fn test_non_string_weather_fields_are_rendered() {
        let item = json!({
            "weather": [{ "main": 800, "description": null, "icon": 4 }]
        });
        let result = WeatherPostProcessor.process(normalized(), &item, "Paris");
        assert_eq!(result.title, "800 in Paris");
        assert_eq!(result.description, "");
        assert_eq!(
            result.image_url.as_deref(),
            Some("https://openweathermap.org/img/wn/4@2x.png")
        );
    }

    #[test]
    fn test_non_numeric_temperature_is_skipped() {
        let item = json!({
            "weather": [{ "main": "Rain", "description": "light rain" }],
            "main": { "temp": "warm" }
        });
        let result = WeatherPostProcessor.process(normalized(), &item, "Oslo");
        assert_eq!(result.description, "light rain");
    }

    #[test]
    fn test_temperature_formatting() {
        assert_eq!(format_temperature(20.0), "20");
        assert_eq!(format_temperature(21.5), "21,5");
        assert_eq!(format_temperature(21.46), "21,5");
        assert_eq!(format_temperature(-3.25), "-3,3");
        assert_eq!(format_temperature(-0.04), "0");
        assert_eq!(format_temperature(9.96), "10");
    }
}
