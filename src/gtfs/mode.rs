use serde::{Deserialize, Serialize};

/// One transit mode: a display name, the GTFS feed it is drawn from and its map color.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitMode {
    pub name: String,
    pub url: String,
    /// Any CSS color.
    pub color: String,
}

impl TransitMode {
    pub fn new(name: &str, url: &str, color: &str) -> Self {
        Self { name: name.to_string(), url: url.to_string(), color: color.to_string() }
    }

    /// Maryland Transit Administration feeds, in declaration order.
    pub fn maryland_defaults() -> Vec<TransitMode> {
        vec![
            Self::new("Local Bus", "https://feeds.mta.maryland.gov/gtfs/local-bus", "blue"),
            Self::new("Light Rail", "https://feeds.mta.maryland.gov/gtfs/light-rail", "purple"),
            Self::new("Metro Subway", "https://feeds.mta.maryland.gov/gtfs/metro", "red"),
            Self::new("MARC Train", "https://feeds.mta.maryland.gov/gtfs/marc", "green"),
            Self::new("Commuter Bus", "https://feeds.mta.maryland.gov/gtfs/commuter-bus", "orange"),
        ]
    }

    /// Title of the route-line layer.
    pub fn routes_layer(&self) -> String { format!("{} Routes", self.name) }

    /// Title of the stop-marker layer.
    pub fn stops_layer(&self) -> String { format!("{} Stops", self.name) }
}
