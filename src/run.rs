//! Run the per-route optimization loop.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::client::{self, CompletionBackend, CompletionRequest, OpenAiClient};
use crate::loader::{self, Credential, Resources};
use crate::plan::Plan;
use crate::prompt::build_prompt;

/// What happened to a single route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// The completion was written to `path`
    Saved { path: PathBuf },

    /// The model produced no result; nothing was written
    Skipped { reason: String },

    /// The model answered but the file could not be written
    WriteFailed { path: PathBuf, reason: String },
}

impl RouteOutcome {
    pub fn is_saved(&self) -> bool {
        matches!(self, RouteOutcome::Saved { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteReport {
    pub route: String,
    pub outcome: RouteOutcome,
}

/// One report per route, in plan order.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub reports: Vec<RouteReport>,
}

impl RunSummary {
    pub fn saved(&self) -> usize {
        self.reports.iter().filter(|r| r.outcome.is_saved()).count()
    }
}

/// Run every route in the plan against the configured API.
///
/// The credential is read first, so a missing key aborts the run before any
/// request is sent or file written. The shared inputs follow; any failure
/// there is also fatal.
pub async fn run(plan: &Plan) -> Result<RunSummary, Error> {
    let credential = Credential::from_file(&plan.resolve(&plan.inputs.credential))?;
    let resources = Resources::load(plan)?;
    plan.check_fleet(&resources.fleet);

    let client = OpenAiClient::new(&plan.model.endpoint, credential)?;
    tracing::info!(
        backend = client.backend_name(),
        endpoint = client.endpoint(),
        model = %plan.model.name,
        profile = %plan.profile,
        routes = plan.routes.len(),
        "Starting run"
    );

    process_routes(plan, &resources, &client).await
}

/// Query `backend` once per route, in plan order, saving each answer.
///
/// Failures stay inside their route: a failed or blank completion skips the
/// route without touching its file, a failed write is recorded, and either
/// way the next route runs.
pub async fn process_routes(
    plan: &Plan,
    resources: &Resources,
    backend: &dyn CompletionBackend,
) -> Result<RunSummary, Error> {
    let output_dir = plan.output_dir();
    std::fs::create_dir_all(&output_dir).map_err(|e| Error::OutputDir {
        path: output_dir.display().to_string(),
        source: e,
    })?;

    let mut summary = RunSummary::default();
    for (idx, route) in plan.routes.iter().enumerate() {
        println!(
            "Processing route {}/{}: {}",
            idx + 1,
            plan.routes.len(),
            route.name
        );

        let prompt = build_prompt(plan, route, resources);
        let request = CompletionRequest::new(plan, prompt);

        let outcome = match backend.complete(&request).await {
            Ok(text) if !text.trim().is_empty() => {
                save_result(&plan.output_path(&route.name), &text)
            }
            Ok(_) => skip_route(&route.name, "completion was empty".to_string()),
            Err(e) => skip_route(&route.name, e.to_string()),
        };

        summary.reports.push(RouteReport {
            route: route.name.clone(),
            outcome,
        });
    }

    println!(
        "\nAll optimizations completed. {}/{} routes saved in '{}'.",
        summary.saved(),
        summary.reports.len(),
        output_dir.display()
    );
    Ok(summary)
}

fn skip_route(route: &str, reason: String) -> RouteOutcome {
    tracing::warn!(route = %route, reason = %reason, "No result");
    println!("  ✗ No result for {route}: {reason}");
    RouteOutcome::Skipped { reason }
}

/// Write the completion verbatim, replacing any earlier result.
fn save_result(path: &Path, text: &str) -> RouteOutcome {
    match std::fs::write(path, text) {
        Ok(()) => {
            println!("  ✓ Saved to {}", path.display());
            RouteOutcome::Saved {
                path: path.to_path_buf(),
            }
        }
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "Failed to save result");
            println!("  ✗ Could not save {}: {e}", path.display());
            RouteOutcome::WriteFailed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            }
        }
    }
}

/// Errors that stop the run before or instead of processing routes.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Load(#[from] loader::Error),

    #[error("failed to create output directory '{path}'")]
    OutputDir {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to set up model client")]
    Client(#[from] client::Error),
}
