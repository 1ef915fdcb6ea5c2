//! crm-journey: inspect and edit journey branching from the command line.
//!
//! Graphs and contact contexts are read from JSON files; results are printed
//! as JSON on stdout and logs go to stderr.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::{info, warn};

use crm_core::config::AppConfig;
use crm_core::event_bus::EventSink;
use crm_core::types::AnalyticsEvent;
use crm_journey::{
    render_branch_filters, ContactContext, Direction, GraphCommand, JourneyGraph, JourneyRouter,
};

#[derive(Parser, Debug)]
#[command(name = "crm-journey")]
#[command(about = "Journey branch evaluation, ordering and filter rendering")]
#[command(version)]
struct Cli {
    /// Optional TOML config file, overlaid by CRM_JOURNEY__* variables
    #[arg(long, global = true, env = "CRM_JOURNEY_CONFIG")]
    config: Option<PathBuf>,

    /// Node identifier (overrides config)
    #[arg(long, global = true, env = "CRM_JOURNEY__NODE_ID")]
    node_id: Option<String>,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Json)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Pick the branch a contact follows out of a node
    Select {
        /// Journey graph JSON file
        #[arg(short, long)]
        graph: PathBuf,

        /// Node the contact is leaving
        #[arg(short, long)]
        node: String,

        /// Contact context JSON file
        #[arg(short, long)]
        context: PathBuf,

        /// Journey id used in logs and events
        #[arg(long, default_value = "cli")]
        journey: String,
    },

    /// Move a branch one slot up or down among its siblings
    Move {
        #[arg(short, long)]
        graph: PathBuf,

        /// Branch id, e.g. e-wait-1-email-2
        #[arg(short, long)]
        branch: String,

        /// Move towards priority 1
        #[arg(long, conflicts_with = "down", required_unless_present = "down")]
        up: bool,

        /// Move away from priority 1
        #[arg(long)]
        down: bool,

        /// Write the reordered graph back to the input file
        #[arg(long, default_value_t = false)]
        write: bool,
    },

    /// Render every branch's conditions as backend filter rules
    Filters {
        #[arg(short, long)]
        graph: PathBuf,
    },

    /// Check priorities and condition configuration
    Check {
        #[arg(short, long)]
        graph: PathBuf,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Json,
    Pretty,
}

/// Forwards analytics events to the log.
struct LogSink;

impl EventSink for LogSink {
    fn emit(&self, event: AnalyticsEvent) {
        info!(
            node_id = %event.node_id,
            event_type = %event.event_type,
            journey_id = %event.journey_id,
            step_id = ?event.step_id,
            branch_id = ?event.branch_id,
            contact_id = ?event.contact_id,
            detail = ?event.detail,
            "Journey event"
        );
    }
}

#[derive(Serialize)]
struct CheckReport {
    ok: bool,
    problems: Vec<String>,
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "crm_journey=info".into());
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.pretty().init(),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    // Load configuration
    let mut config = AppConfig::load_from(cli.config.as_deref()).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });
    if let Some(node_id) = cli.node_id {
        config.node_id = node_id;
    }
    info!(
        node_id = %config.node_id,
        undo_window_secs = config.journey.undo_window_secs,
        strict_priorities = config.journey.strict_priorities,
        "Configuration loaded"
    );

    match cli.command {
        Commands::Select {
            graph,
            node,
            context,
            journey,
        } => cmd_select(&config, &graph, &node, &context, &journey),
        Commands::Move {
            graph,
            branch,
            up,
            down: _,
            write,
        } => {
            let direction = if up { Direction::Up } else { Direction::Down };
            cmd_move(&config, &graph, &branch, direction, write)
        }
        Commands::Filters { graph } => cmd_filters(&graph),
        Commands::Check { graph } => cmd_check(&graph),
    }
}

fn cmd_select(
    config: &AppConfig,
    graph_path: &Path,
    node: &str,
    context_path: &Path,
    journey: &str,
) -> Result<()> {
    let graph = read_graph(graph_path)?;
    let context: ContactContext = read_json(context_path)?;
    let contact_id = context
        .contact_id
        .clone()
        .unwrap_or_else(|| "anonymous".to_string());

    let router = router(config);
    router.register(journey, graph)?;
    let outcome = router.route(journey, node, &contact_id, &context)?;
    print_json(&outcome)
}

fn cmd_move(
    config: &AppConfig,
    graph_path: &Path,
    branch: &str,
    direction: Direction,
    write: bool,
) -> Result<()> {
    let journey = "cli";
    let router = router(config);
    router.register(journey, read_graph(graph_path)?)?;

    let delta = router.apply(
        journey,
        &GraphCommand::Move {
            branch_id: branch.to_string(),
            direction,
        },
    )?;
    if delta.is_empty() {
        info!(branch_id = %branch, ?direction, "Branch already at the boundary");
    }

    if write && !delta.is_empty() {
        let graph = router
            .get_graph(journey)
            .context("journey graph disappeared after the move")?;
        let body = serde_json::to_string_pretty(&graph)?;
        fs::write(graph_path, body)
            .with_context(|| format!("writing {}", graph_path.display()))?;
        info!(path = %graph_path.display(), "Wrote reordered graph");
    }
    print_json(&delta)
}

fn cmd_filters(graph_path: &Path) -> Result<()> {
    let graph = read_graph(graph_path)?;
    let rules: Vec<_> = graph.branches.iter().map(render_branch_filters).collect();
    print_json(&rules)
}

fn cmd_check(graph_path: &Path) -> Result<()> {
    let graph = read_graph(graph_path)?;
    let mut problems = Vec::new();

    for source in graph.sources() {
        if graph.node(source).is_none() {
            problems.push(format!("branches leave unknown node `{}`", source));
        }
    }
    if let Err(err) = graph.check_priorities() {
        problems.push(err.to_string());
    }
    for branch in &graph.branches {
        if branch.rule_not_allowed && !branch.conditions.is_empty() {
            problems.push(format!(
                "branch `{}` leaves a trigger but carries {} conditions",
                branch.id,
                branch.conditions.len()
            ));
        }
        for condition in &branch.conditions {
            if let Err(err) = condition.validate() {
                problems.push(format!("branch `{}`: {}", branch.id, err));
            }
        }
    }

    let report = CheckReport {
        ok: problems.is_empty(),
        problems,
    };
    print_json(&report)?;
    if !report.ok {
        bail!("{} problem(s) found in {}", report.problems.len(), graph_path.display());
    }
    Ok(())
}

fn router(config: &AppConfig) -> JourneyRouter {
    JourneyRouter::new(config.journey.clone())
        .with_event_sink(Arc::new(LogSink))
        .with_node_id(config.node_id.clone())
}

fn read_graph(path: &Path) -> Result<JourneyGraph> {
    read_json(path)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let body = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&body).with_context(|| format!("parsing {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("crm-journey").chain(args.iter().copied()))
    }

    #[test]
    fn test_move_takes_up_or_down_flag() {
        let cli = parse(&["move", "--graph", "g.json", "--branch", "e-a-b", "--up"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Move { up: true, down: false, .. }
        ));

        let cli = parse(&["move", "--graph", "g.json", "--branch", "e-a-b", "--down"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Move { up: false, down: true, .. }
        ));
    }

    #[test]
    fn test_move_needs_exactly_one_direction() {
        assert!(parse(&["move", "--graph", "g.json", "--branch", "e-a-b"]).is_err());
        assert!(parse(&["move", "--graph", "g.json", "--branch", "e-a-b", "--up", "--down"]).is_err());
    }
}
