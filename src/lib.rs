//! Ferry planner: ask a language model to rework ferry schedules, one route at a time.
//!
//! For each route in a plan, the planner combines the route's current
//! schedule, the shared route descriptions, and the vessels assigned to it
//! into a prompt, sends it to a chat-completion API, and saves the answer
//! verbatim to `optimized_schedules/<route>_optimized_schedule.csv`.
//!
//! # Architecture
//!
//! - **Plan**: Parse and validate the route plan and its profile
//! - **Loader**: Read the credential, trip history, route descriptions and fleet
//! - **Schedule**: Render a schedule table (or its read error) as prompt text
//! - **Prompt**: Assemble the per-route prompt
//! - **Client**: Send a prompt to the chat-completion endpoint
//! - **Run**: Process every route, isolating failures per route

pub mod client;
pub mod loader;
pub mod plan;
pub mod prompt;
pub mod run;
pub mod schedule;

pub use client::{CompletionBackend, CompletionRequest, OpenAiClient};
pub use loader::{Credential, FleetRegistry, Resources, TripHistory};
pub use plan::{Plan, Profile, RouteSpec};
pub use prompt::build_prompt;
pub use run::{RouteOutcome, RouteReport, RunSummary, process_routes, run};
pub use schedule::ScheduleSnippet;
