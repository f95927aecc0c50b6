use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    /// Returns `None` for non-finite values or values outside WGS84 bounds.
    pub fn new(latitude: f64, longitude: f64) -> Option<Self> {
        let lat_ok = latitude.is_finite() && (-90.0..=90.0).contains(&latitude);
        let lon_ok = longitude.is_finite() && (-180.0..=180.0).contains(&longitude);
        (lat_ok && lon_ok).then_some(Self {
            latitude,
            longitude,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeatherInfo {
    pub temperature: String,
    pub condition: String,
    pub wind_speed: String,
    pub wind_direction: String,
}

impl WeatherInfo {
    /// All four readings present and non-empty.
    pub fn is_complete(&self) -> bool {
        [
            &self.temperature,
            &self.condition,
            &self.wind_speed,
            &self.wind_direction,
        ]
        .iter()
        .all(|s| !s.trim().is_empty())
    }

    fn from_value(value: Option<&Value>) -> Self {
        let Some(obj) = value.and_then(Value::as_object) else {
            return Self::default();
        };
        Self {
            temperature: text_field(obj, "temperature"),
            condition: text_field(obj, "condition"),
            wind_speed: text_field(obj, "windSpeed"),
            wind_direction: text_field(obj, "windDirection"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attraction {
    pub name: String,
    pub description: String,
    pub bearing: String,
    pub distance: String,
    pub kind: String,
}

impl Attraction {
    fn from_object(obj: &Map<String, Value>) -> Self {
        Self {
            name: text_field(obj, "name"),
            description: text_field(obj, "description"),
            bearing: text_field(obj, "bearing"),
            distance: text_field(obj, "distance"),
            kind: text_field(obj, "type"),
        }
    }
}

/// The payload rendered on the dashboard. Built wholesale from one model reply.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocationData {
    pub address: String,
    pub location_name: String,
    pub weather: WeatherInfo,
    pub attractions: Vec<Attraction>,
}

impl LocationData {
    /// Top-level keys that mark an object as a location payload.
    pub const RECOGNIZED_FIELDS: [&'static str; 3] = ["locationName", "weather", "attractions"];

    /// Builds a record from an already-parsed JSON object.
    ///
    /// Missing or wrongly-typed fields come out empty instead of failing:
    /// scalar values in string slots are stringified, a non-array
    /// `attractions` becomes an empty list and non-object entries in it are
    /// dropped.
    pub fn from_object(obj: &Map<String, Value>) -> Self {
        let attractions = obj
            .get("attractions")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_object)
                    .map(Attraction::from_object)
                    .collect()
            })
            .unwrap_or_default();

        Self {
            address: text_field(obj, "address"),
            location_name: text_field(obj, "locationName"),
            weather: WeatherInfo::from_value(obj.get("weather")),
            attractions,
        }
    }

    pub fn has_recognized_field(obj: &Map<String, Value>) -> bool {
        Self::RECOGNIZED_FIELDS.iter().any(|k| obj.contains_key(*k))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroundingSource {
    pub title: String,
    pub uri: String,
}

fn text_field(obj: &Map<String, Value>, key: &str) -> String {
    match obj.get(key) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn coordinates_reject_out_of_range() {
        assert!(Coordinates::new(25.03, 121.56).is_some());
        assert!(Coordinates::new(91.0, 0.0).is_none());
        assert!(Coordinates::new(0.0, -180.5).is_none());
        assert!(Coordinates::new(f64::NAN, 0.0).is_none());
    }

    #[test]
    fn lenient_mapping_fills_gaps() {
        let value = json!({
            "locationName": "Ferry Building",
            "weather": { "temperature": 18, "condition": "Fog" },
            "attractions": [
                { "name": "Pier 39", "distance": "2 km" },
                "not an object",
                { "name": "Coit Tower", "type": "Landmark", "bearing": "NW" }
            ]
        });
        let data = LocationData::from_object(value.as_object().unwrap());

        assert_eq!(data.location_name, "Ferry Building");
        assert_eq!(data.address, "");
        assert_eq!(data.weather.temperature, "18");
        assert_eq!(data.weather.wind_speed, "");
        assert!(!data.weather.is_complete());
        assert_eq!(data.attractions.len(), 2);
        assert_eq!(data.attractions[1].kind, "Landmark");
        assert_eq!(data.attractions[0].description, "");
    }

    #[test]
    fn wrong_typed_attractions_become_empty() {
        let value = json!({ "locationName": "X", "attractions": "none nearby" });
        let data = LocationData::from_object(value.as_object().unwrap());
        assert!(data.attractions.is_empty());
    }

    #[test]
    fn weather_completeness_requires_all_four() {
        let weather = WeatherInfo {
            temperature: "25°C".into(),
            condition: "多云".into(),
            wind_speed: "15 km/h".into(),
            wind_direction: "西北".into(),
        };
        assert!(weather.is_complete());
        let blank = WeatherInfo {
            wind_direction: "  ".into(),
            ..weather
        };
        assert!(!blank.is_complete());
    }
}
