use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use ferry_planner::{Plan, Profile, Resources};

#[derive(Parser)]
#[command(name = "ferry-planner")]
#[command(about = "Ask a language model to optimize ferry schedules route by route")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Query the model for every route in the plan and save each answer
    Run {
        #[command(flatten)]
        plan: PlanArgs,

        /// Model identifier (overrides the plan)
        #[arg(long)]
        model: Option<String>,
    },

    /// Print the prompt for one route without contacting the model
    Prompt {
        /// Route name as listed in the plan
        route: String,

        #[command(flatten)]
        plan: PlanArgs,
    },

    /// Print the effective plan as TOML, e.g. to start a custom plan from the built-in one
    Plan {
        #[command(flatten)]
        plan: PlanArgs,
    },
}

#[derive(Args)]
struct PlanArgs {
    /// Path to a route plan TOML file (default: built-in plan, relative to the working directory)
    #[arg(long, env = "FERRY_PLAN")]
    plan: Option<PathBuf>,

    /// Prompt profile (overrides the plan)
    #[arg(long, value_enum)]
    profile: Option<Profile>,
}

impl PlanArgs {
    fn load(&self) -> anyhow::Result<Plan> {
        let mut plan = match &self.plan {
            Some(path) => Plan::load(path)
                .with_context(|| format!("loading plan {}", path.display()))?,
            None => Plan::builtin()?,
        };
        if let Some(profile) = self.profile {
            plan.profile = profile;
        }
        Ok(plan)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run { plan, model } => {
            let mut plan = plan.load()?;
            if let Some(model) = model {
                plan.model.name = model;
            }
            ferry_planner::run(&plan).await?;
        }
        Command::Prompt { route, plan } => {
            let plan = plan.load()?;
            let resources = Resources::load(&plan)?;
            plan.check_fleet(&resources.fleet);
            let Some(route) = plan.route(&route) else {
                anyhow::bail!("route '{route}' is not in the plan");
            };
            print!("{}", ferry_planner::build_prompt(&plan, route, &resources));
        }
        Command::Plan { plan } => {
            let plan = plan.load()?;
            print!("{}", plan.to_toml().context("serializing plan")?);
        }
    }

    Ok(())
}
