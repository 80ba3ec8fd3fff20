//! Load the credential and the shared input files.
//!
//! Everything here is read once at startup. Any failure is fatal for the run
//! since every route's prompt depends on these inputs.

use std::fmt;
use std::path::Path;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::plan::Plan;

/// The API key, read from a plain-text file.
#[derive(Clone)]
pub struct Credential(String);

impl Credential {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Read the key from `path`, trimming surrounding whitespace.
    pub fn from_file(path: &Path) -> Result<Self, Error> {
        let key = read(path)?;
        let key = key.trim();
        if key.is_empty() {
            return Err(Error::EmptyCredential(path.display().to_string()));
        }
        Ok(Self(key.to_string()))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Vessel attributes keyed by vessel name, in file order.
#[derive(Debug, Clone, Default)]
pub struct FleetRegistry {
    vessels: Map<String, Value>,
}

impl FleetRegistry {
    /// Parse a registry from JSON. The top level must be an object.
    pub fn from_json(content: &str) -> Result<Self, FleetError> {
        match serde_json::from_str::<Value>(content)? {
            Value::Object(vessels) => Ok(Self { vessels }),
            _ => Err(FleetError::NotAnObject),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vessels.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vessels.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.vessels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vessels.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.vessels.keys().map(String::as_str)
    }

    /// The attributes of the named vessels as one JSON value.
    ///
    /// No names gives `null`, a single name gives that vessel's entry as-is,
    /// and several names give an object keyed by vessel name in the order
    /// given. Names missing from the registry map to `null`.
    pub fn subset(&self, names: &[String]) -> Value {
        match names {
            [] => Value::Null,
            [name] => self.get(name).cloned().unwrap_or(Value::Null),
            names => Value::Object(
                names
                    .iter()
                    .map(|name| (name.clone(), self.get(name).cloned().unwrap_or(Value::Null)))
                    .collect(),
            ),
        }
    }
}

/// Errors specific to the shape of the fleet registry.
#[derive(Debug, Error)]
pub enum FleetError {
    #[error("invalid JSON")]
    Json(#[from] serde_json::Error),

    #[error("top level must be an object keyed by vessel name")]
    NotAnObject,
}

/// Historical trip records. Only loaded to confirm the file is readable;
/// prompts do not embed it.
#[derive(Debug, Clone)]
pub struct TripHistory {
    headers: csv::StringRecord,
    records: Vec<csv::StringRecord>,
}

impl TripHistory {
    pub fn from_csv(content: &str) -> Result<Self, csv::Error> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(content.as_bytes());
        let headers = reader.headers()?.clone();
        let records = reader.records().collect::<Result<Vec<_>, _>>()?;
        Ok(Self { headers, records })
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.headers.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Inputs shared by every route's prompt.
#[derive(Debug, Clone)]
pub struct Resources {
    pub trips: TripHistory,
    pub route_descriptions: String,
    pub fleet: FleetRegistry,
}

impl Resources {
    /// Read the trip history, route descriptions and fleet registry named by
    /// the plan's `[inputs]` table.
    pub fn load(plan: &Plan) -> Result<Self, Error> {
        let trips_path = plan.resolve(&plan.inputs.trips);
        let trips = TripHistory::from_csv(&read(&trips_path)?).map_err(|e| Error::Trips {
            path: trips_path.display().to_string(),
            source: e,
        })?;
        tracing::info!(
            path = %trips_path.display(),
            rows = trips.len(),
            columns = trips.columns().count(),
            "Loaded trip history"
        );
        if trips.is_empty() {
            tracing::warn!(path = %trips_path.display(), "Trip history has no records");
        }

        let route_descriptions = read(&plan.resolve(&plan.inputs.route_descriptions))?;

        let fleet_path = plan.resolve(&plan.inputs.fleet);
        let fleet = FleetRegistry::from_json(&read(&fleet_path)?).map_err(|e| Error::Fleet {
            path: fleet_path.display().to_string(),
            source: e,
        })?;
        tracing::info!(
            path = %fleet_path.display(),
            vessels = fleet.len(),
            "Loaded fleet registry"
        );
        if fleet.is_empty() {
            tracing::warn!(
                path = %fleet_path.display(),
                "Fleet registry is empty; every fleet embeds null"
            );
        }

        Ok(Self {
            trips,
            route_descriptions,
            fleet,
        })
    }
}

fn read(path: &Path) -> Result<String, Error> {
    std::fs::read_to_string(path).map_err(|e| Error::Read {
        path: path.display().to_string(),
        source: e,
    })
}

/// Errors that abort a run before any route is processed.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read '{path}'")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("credential file '{0}' is empty")]
    EmptyCredential(String),

    #[error("failed to parse trip history '{path}'")]
    Trips {
        path: String,
        #[source]
        source: csv::Error,
    },

    #[error("failed to parse fleet registry '{path}'")]
    Fleet {
        path: String,
        #[source]
        source: FleetError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const FLEET: &str = r#"{
        "Yxlan": {"capacity_cars": 60, "fuel": "diesel-electric"},
        "Nina": {"capacity_cars": 25, "fuel": "diesel"},
        "Fragancia": {"capacity_cars": 40, "fuel": "electric"}
    }"#;

    #[test]
    fn credential_is_trimmed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("OPENAIKEY.txt");
        std::fs::write(&path, "  sk-test-123\n").unwrap();

        let credential = Credential::from_file(&path).unwrap();
        assert_eq!(credential.expose(), "sk-test-123");
    }

    #[test]
    fn blank_credential_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("OPENAIKEY.txt");
        std::fs::write(&path, "\n\n").unwrap();

        assert!(matches!(
            Credential::from_file(&path),
            Err(Error::EmptyCredential(_))
        ));
    }

    #[test]
    fn missing_credential_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Credential::from_file(&dir.path().join("absent.txt")),
            Err(Error::Read { .. })
        ));
    }

    #[test]
    fn credential_debug_is_redacted() {
        let credential = Credential::new("sk-secret");
        assert!(!format!("{credential:?}").contains("sk-secret"));
    }

    #[test]
    fn registry_keeps_file_order() {
        let registry = FleetRegistry::from_json(FLEET).unwrap();
        let names: Vec<_> = registry.names().collect();
        assert_eq!(names, ["Yxlan", "Nina", "Fragancia"]);
    }

    #[test]
    fn registry_must_be_an_object() {
        assert!(matches!(
            FleetRegistry::from_json(r#"["Yxlan"]"#),
            Err(FleetError::NotAnObject)
        ));
        assert!(matches!(
            FleetRegistry::from_json("{"),
            Err(FleetError::Json(_))
        ));
    }

    #[test]
    fn subset_of_one_vessel_is_its_entry() {
        let registry = FleetRegistry::from_json(FLEET).unwrap();
        assert_eq!(
            registry.subset(&["Nina".to_string()]),
            json!({"capacity_cars": 25, "fuel": "diesel"})
        );
    }

    #[test]
    fn subset_of_no_vessels_is_null() {
        let registry = FleetRegistry::from_json(FLEET).unwrap();
        assert_eq!(registry.subset(&[]), Value::Null);
        assert_eq!(registry.subset(&["Gulli".to_string()]), Value::Null);
    }

    #[test]
    fn subset_of_several_vessels_is_keyed_in_route_order() {
        let registry = FleetRegistry::from_json(FLEET).unwrap();
        let subset = registry.subset(&["Fragancia".to_string(), "Yxlan".to_string()]);

        let keys: Vec<_> = subset.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, ["Fragancia", "Yxlan"]);
        assert_eq!(subset["Yxlan"]["fuel"], "diesel-electric");
    }

    #[test]
    fn trip_history_counts_rows() {
        let trips = TripHistory::from_csv("route,departure\nA,06:00\nA,06:25\n").unwrap();
        assert_eq!(trips.len(), 2);
        assert_eq!(trips.columns().collect::<Vec<_>>(), ["route", "departure"]);
    }

    #[test]
    fn ragged_trip_history_still_loads() {
        let trips = TripHistory::from_csv(
            "date,route,passengers\n2024-06-01,Aspöleden\n2024-06-02,Aspöleden,120,late\n",
        )
        .unwrap();
        assert_eq!(trips.columns().count(), 3);
        assert_eq!(trips.len(), 2);
    }

    #[test]
    fn header_only_trip_history_is_empty() {
        let trips = TripHistory::from_csv("date,route,passengers\n").unwrap();
        assert!(trips.is_empty());
    }
}
