//! Route plan types.
//!
//! The plan is a TOML file that names the input files, the model settings,
//! and the routes to optimize, in the order they are processed. A built-in
//! plan covering the five archipelago routes is used when none is given.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::loader::FleetRegistry;

const BUILTIN_PLAN: &str = include_str!("default_plan.toml");

/// Characters no route name may contain on any common file system.
const FORBIDDEN_IN_FILE_NAMES: [char; 9] = ['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// The complete route plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Plan {
    /// Which prompt profile to use for every route
    #[serde(default)]
    pub profile: Profile,

    /// Directory receiving one `<route>_optimized_schedule.csv` per route
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Locations of the shared input files
    #[serde(default)]
    pub inputs: Inputs,

    /// Chat-completion endpoint and sampling settings
    #[serde(default)]
    pub model: ModelSettings,

    /// Routes to optimize, in order
    #[serde(rename = "route", default)]
    pub routes: Vec<RouteSpec>,

    /// Directory that relative paths are resolved against
    #[serde(skip)]
    base_dir: PathBuf,
}

/// Paths of the files every prompt depends on.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Inputs {
    /// Plain-text file holding the API key
    #[serde(default = "default_credential")]
    pub credential: PathBuf,

    /// Trip-history table (CSV)
    #[serde(default = "default_trips")]
    pub trips: PathBuf,

    /// Free-text description of all routes
    #[serde(default = "default_route_descriptions")]
    pub route_descriptions: PathBuf,

    /// Fleet registry (JSON object keyed by vessel name)
    #[serde(default = "default_fleet")]
    pub fleet: PathBuf,
}

/// Settings for the chat-completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelSettings {
    /// Base URL of the API; `/chat/completions` is appended
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Model identifier
    #[serde(default = "default_model")]
    pub name: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Overrides the profile's token budget when set
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

/// A single route to optimize.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouteSpec {
    /// Route name, also used for the output file name
    pub name: String,

    /// Path to the route's current schedule (CSV)
    pub schedule: PathBuf,

    /// Vessel names from the fleet registry assigned to this route
    #[serde(default)]
    pub fleet: Vec<String>,

    /// Free-text optimization instructions for the model
    #[serde(default)]
    pub directive: Option<String>,
}

/// How much context the prompt carries and how long an answer is allowed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Profile {
    /// Schedule excerpt, per-route directive, long answer with analysis
    #[default]
    Directed,

    /// Whole schedule, fixed goal list, short answer
    Baseline,
}

impl Profile {
    /// Number of schedule rows embedded in the prompt; `None` means all.
    pub fn schedule_rows(self) -> Option<usize> {
        match self {
            Profile::Directed => Some(10),
            Profile::Baseline => None,
        }
    }

    /// Default token budget for the completion.
    pub fn max_tokens(self) -> u32 {
        match self {
            Profile::Directed => 3000,
            Profile::Baseline => 500,
        }
    }

    /// Framing sent as the `system` message.
    pub fn system_prompt(self) -> &'static str {
        match self {
            Profile::Directed => {
                "You are an expert in transportation and ferry schedule optimization."
            }
            Profile::Baseline => "You are an expert in transportation and ferry optimization.",
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Profile::Directed => f.write_str("directed"),
            Profile::Baseline => f.write_str("baseline"),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("optimized_schedules")
}

fn default_credential() -> PathBuf {
    PathBuf::from("OPENAIKEY.txt")
}

fn default_trips() -> PathBuf {
    PathBuf::from("ferry_trips_data.csv")
}

fn default_route_descriptions() -> PathBuf {
    PathBuf::from("route_descriptions.md")
}

fn default_fleet() -> PathBuf {
    PathBuf::from("ferries.json")
}

fn default_endpoint() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4".to_string()
}

fn default_temperature() -> f32 {
    0.5
}

impl Default for Inputs {
    fn default() -> Self {
        Self {
            credential: default_credential(),
            trips: default_trips(),
            route_descriptions: default_route_descriptions(),
            fleet: default_fleet(),
        }
    }
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            name: default_model(),
            temperature: default_temperature(),
            max_tokens: None,
        }
    }
}

impl Plan {
    /// Parse and validate a plan from TOML content.
    ///
    /// Relative paths resolve against the working directory until
    /// [`Plan::with_base_dir`] says otherwise.
    pub fn from_toml(content: &str) -> Result<Self, Error> {
        let plan: Plan = toml::from_str(content)?;
        plan.validate()?;
        Ok(plan)
    }

    /// Load a plan file; relative paths inside it resolve against its directory.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        let base_dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."))
            .to_path_buf();
        Ok(Self::from_toml(&content)?.with_base_dir(base_dir))
    }

    /// The built-in plan, resolved against the working directory.
    pub fn builtin() -> Result<Self, Error> {
        Self::from_toml(BUILTIN_PLAN)
    }

    /// Serialize the plan back to TOML.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = base_dir.into();
        self
    }

    /// Resolve a plan-relative path. Absolute paths are returned unchanged.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        self.base_dir.join(path)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.resolve(&self.output_dir)
    }

    /// Where the result for `route` is written.
    pub fn output_path(&self, route: &str) -> PathBuf {
        self.output_dir()
            .join(format!("{route}_optimized_schedule.csv"))
    }

    /// Token budget: the explicit override, or the profile's default.
    pub fn max_tokens(&self) -> u32 {
        self.model
            .max_tokens
            .unwrap_or_else(|| self.profile.max_tokens())
    }

    /// Find a route by name.
    pub fn route(&self, name: &str) -> Option<&RouteSpec> {
        self.routes.iter().find(|r| r.name == name)
    }

    /// Warn about every vessel a route assigns that the registry lacks.
    ///
    /// Such vessels are embedded as `null` and the route still runs. Returns
    /// how many assignments were unknown.
    pub fn check_fleet(&self, registry: &FleetRegistry) -> usize {
        let mut unknown = 0;
        for route in &self.routes {
            for vessel in route.fleet.iter().filter(|v| !registry.contains(v)) {
                tracing::warn!(
                    route = %route.name,
                    vessel = %vessel,
                    known = ?registry.names().collect::<Vec<_>>(),
                    "Vessel not in fleet registry; embedding null"
                );
                unknown += 1;
            }
        }
        unknown
    }

    fn validate(&self) -> Result<(), Error> {
        if self.routes.is_empty() {
            return Err(Error::NoRoutes);
        }

        let mut seen = HashSet::new();
        for route in &self.routes {
            // The name becomes part of a file name
            let name = route.name.trim();
            if name.is_empty()
                || name == "."
                || name == ".."
                || name.chars().any(|c| c.is_control() || FORBIDDEN_IN_FILE_NAMES.contains(&c))
            {
                return Err(Error::InvalidRouteName(route.name.clone()));
            }
            if !seen.insert(route.name.as_str()) {
                return Err(Error::DuplicateRoute(route.name.clone()));
            }
        }
        Ok(())
    }
}

/// Errors from loading or validating a plan.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read plan file '{path}'")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse plan")]
    Parse(#[from] toml::de::Error),

    #[error("plan does not list any routes")]
    NoRoutes,

    #[error("route '{0}' is listed more than once")]
    DuplicateRoute(String),

    #[error("route name '{0}' cannot be used in a file name")]
    InvalidRouteName(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[[route]]
name = "TestRoute"
schedule = "schedules/test.csv"
fleet = ["Yxlan"]
"#;

    #[test]
    fn builtin_plan_lists_the_five_routes_in_order() {
        let plan = Plan::builtin().unwrap();
        let names: Vec<_> = plan.routes.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(
            names,
            [
                "Aspöleden",
                "Oxdjupsleden",
                "Furusundsleden",
                "Vaxholmsleden",
                "Ljusteröleden"
            ]
        );
        assert_eq!(plan.profile, Profile::Directed);
        assert_eq!(plan.model.name, "gpt-4");
        assert!(plan.routes.iter().all(|r| r.directive.is_some()));
    }

    #[test]
    fn defaults_fill_missing_sections() {
        let plan = Plan::from_toml(MINIMAL).unwrap();
        assert_eq!(plan.profile, Profile::Directed);
        assert_eq!(plan.output_dir, PathBuf::from("optimized_schedules"));
        assert_eq!(plan.inputs.credential, PathBuf::from("OPENAIKEY.txt"));
        assert_eq!(plan.model.endpoint, "https://api.openai.com/v1");
        assert_eq!(plan.model.temperature, 0.5);
        assert_eq!(plan.routes[0].directive, None);
    }

    #[test]
    fn profile_selects_token_budget_unless_overridden() {
        let mut plan = Plan::from_toml(MINIMAL).unwrap();
        assert_eq!(plan.max_tokens(), 3000);

        plan.profile = Profile::Baseline;
        assert_eq!(plan.max_tokens(), 500);

        plan.model.max_tokens = Some(1200);
        assert_eq!(plan.max_tokens(), 1200);
    }

    #[test]
    fn profile_row_limits() {
        assert_eq!(Profile::Directed.schedule_rows(), Some(10));
        assert_eq!(Profile::Baseline.schedule_rows(), None);
    }

    #[test]
    fn output_path_is_named_after_route() {
        let plan = Plan::from_toml(MINIMAL).unwrap().with_base_dir("/data");
        assert_eq!(
            plan.output_path("TestRoute"),
            PathBuf::from("/data/optimized_schedules/TestRoute_optimized_schedule.csv")
        );
    }

    #[test]
    fn absolute_paths_ignore_base_dir() {
        let plan = Plan::from_toml(MINIMAL).unwrap().with_base_dir("/data");
        assert_eq!(plan.resolve(Path::new("/etc/key")), PathBuf::from("/etc/key"));
        assert_eq!(
            plan.resolve(Path::new("ferries.json")),
            PathBuf::from("/data/ferries.json")
        );
    }

    #[test]
    fn rejects_duplicate_routes() {
        let content = format!("{MINIMAL}{MINIMAL}");
        assert!(matches!(
            Plan::from_toml(&content),
            Err(Error::DuplicateRoute(name)) if name == "TestRoute"
        ));
    }

    #[test]
    fn rejects_route_names_with_separators() {
        let content = r#"
[[route]]
name = "../escape"
schedule = "s.csv"
"#;
        assert!(matches!(
            Plan::from_toml(content),
            Err(Error::InvalidRouteName(_))
        ));
    }

    #[test]
    fn rejects_empty_plan() {
        assert!(matches!(Plan::from_toml(""), Err(Error::NoRoutes)));
    }

    #[test]
    fn rejects_unknown_keys() {
        let content = format!("profle = \"baseline\"\n{MINIMAL}");
        assert!(matches!(Plan::from_toml(&content), Err(Error::Parse(_))));
    }

    #[test]
    fn baseline_profile_parses() {
        let content = format!("profile = \"baseline\"\n{MINIMAL}");
        let plan = Plan::from_toml(&content).unwrap();
        assert_eq!(plan.profile, Profile::Baseline);
    }

    #[test]
    fn check_fleet_counts_unknown_vessels() {
        let plan = Plan::from_toml(MINIMAL).unwrap();

        let registry = FleetRegistry::from_json(r#"{"Yxlan": {"capacity": 397}}"#).unwrap();
        assert_eq!(plan.check_fleet(&registry), 0);

        let registry = FleetRegistry::from_json(r#"{"Nina": {"capacity": 60}}"#).unwrap();
        assert_eq!(plan.check_fleet(&registry), 1);
    }

    #[test]
    fn rejects_route_names_unusable_as_file_names() {
        for name in ["a:b", "what?", "tab\\there", "nul\\u0000", "pipe|d"] {
            let content = format!("[[route]]\nname = \"{name}\"\nschedule = \"s.csv\"\n");
            assert!(
                matches!(Plan::from_toml(&content), Err(Error::InvalidRouteName(_))),
                "accepted {name:?}"
            );
        }
    }

    #[test]
    fn accepts_non_ascii_route_names() {
        let content = "[[route]]\nname = \"Ljusteröleden\"\nschedule = \"s.csv\"\n";
        assert!(Plan::from_toml(content).is_ok());
    }

    #[test]
    fn plan_survives_toml_round_trip() {
        let plan = Plan::builtin().unwrap();
        let reparsed = Plan::from_toml(&plan.to_toml().unwrap()).unwrap();
        assert_eq!(reparsed.routes.len(), plan.routes.len());
        assert_eq!(reparsed.routes[2].directive, plan.routes[2].directive);
    }
}
