//! Geocoding results.

/// A resolved place. Consumed by the matching pipeline, never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct Place {
    pub latitude: f64,
    pub longitude: f64,
    pub display_name: String,
    pub country: Option<String>,
    pub city: Option<String>,
    /// Administrative level, e.g. `city`, `state`, `country`
    pub place_type: Option<String>,
    /// `[south, north, west, east]`
    pub bounding_box: Option<[f64; 4]>,
}

impl Place {
    /// Human-readable suggestion label: `"<country>"` or `"<country>, <city>"`.
    pub fn label(&self) -> String {
        let country = self.country.as_deref().unwrap_or(&self.display_name);
        match self.city.as_deref() {
            Some(city) if !city.is_empty() => format!("{country}, {city}"),
            _ => country.to_string(),
        }
    }
}
