//! Build the optimization prompt for a route.

use serde_json::Value;

use crate::loader::Resources;
use crate::plan::{Plan, Profile, RouteSpec};
use crate::schedule::ScheduleSnippet;

/// Everything interpolated into one route's prompt.
#[derive(Debug, Clone)]
pub struct PromptContext<'a> {
    pub route: &'a str,
    pub route_descriptions: &'a str,
    pub schedule: &'a ScheduleSnippet,
    pub fleet: &'a Value,
    pub directive: Option<&'a str>,
}

/// Build the prompt for `route` under the plan's profile.
///
/// Never fails: an unreadable schedule is described inline instead.
#[must_use]
pub fn build_prompt(plan: &Plan, route: &RouteSpec, resources: &Resources) -> String {
    let schedule = ScheduleSnippet::read(
        &plan.resolve(&route.schedule),
        plan.profile.schedule_rows(),
    );
    if !schedule.is_available() {
        tracing::debug!(route = %route.name, "Embedding schedule error in prompt");
    }
    let fleet = resources.fleet.subset(&route.fleet);

    render(
        plan.profile,
        &PromptContext {
            route: &route.name,
            route_descriptions: &resources.route_descriptions,
            schedule: &schedule,
            fleet: &fleet,
            directive: route.directive.as_deref(),
        },
    )
}

/// Render a prompt from already-loaded context.
#[must_use]
pub fn render(profile: Profile, cx: &PromptContext<'_>) -> String {
    match profile {
        Profile::Directed => render_directed(cx),
        Profile::Baseline => render_baseline(cx),
    }
}

fn render_directed(cx: &PromptContext<'_>) -> String {
    let directive = cx
        .directive
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .unwrap_or("No specific optimization goals provided.");

    format!(
        r#"
You are tasked with optimizing ferry schedules and fleet usage for the route '{route}'.

Route Details:
{descriptions}

Current Schedule (CSV format snippet):
{schedule}

Current Fleet:
{fleet:#}

Optimization Goals:
{directive}

Provide:
1. A detailed optimized schedule in CSV format. DO NOT SIMPLIFY IT.
2. Adjusted fleet assignments for peak and off-peak hours.
3. Feasibility analysis for proposed changes, especially ensuring demand is met and emissions are reduced.
4. Simulated amount of emissions decreased and demand being met.
"#,
        route = cx.route,
        descriptions = cx.route_descriptions,
        schedule = cx.schedule,
        fleet = cx.fleet,
    )
}

fn render_baseline(cx: &PromptContext<'_>) -> String {
    format!(
        r#"
Optimize ferry operations for the route {route}.
Route Details:
{descriptions}

Current Schedule (CSV format):
{schedule}

Current Fleet:
{fleet:#}

Goals:
1. Reduce emissions.
2. Meet demand efficiently.
3. Avoid unmet demand during peak hours.
4. Minimize underutilized trips during off-peak hours.

Provide:
1. Optimized schedules in CSV format.
2. Fleet allocation adjustments.
"#,
        route = cx.route,
        descriptions = cx.route_descriptions,
        schedule = cx.schedule,
        fleet = cx.fleet,
    )
}
