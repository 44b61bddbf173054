use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use connectome_cache::{ClosureCallbacks, RingOptions, SettleScheduler, SlidingRing};
use connectome_core::{
    ColoringOption, ConfigManager, Connection, ConnectomeConfig, LoggingConfig, Neuron,
    ViewerType, Workspace,
};
use connectome_graph::{
    group_selected, join_selected, split_selected, ungroup, GraphReconciler, ReconcileInput,
    ReconcileOptions, RenderedGraph, SplitJoinState,
};
use connectome_sync::{SyncOrchestrator, SynchronizerPair};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, trace};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "connectome")]
#[command(about = "Connectome viewer engines - graph reconciliation, selection sync and slice windows", long_about = None)]
#[command(version)]
struct Cli {
    /// Output format (json, pretty)
    #[arg(short, long, global = true, default_value = "pretty")]
    output: OutputFormat,

    /// Config file, instead of ./.connectome.toml or ~/.connectome/config.toml
    #[arg(long, global = true, env = "CONNECTOME_CONFIG")]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Json,
    Pretty,
}

#[derive(Args)]
struct WorkspaceArgs {
    /// Workspace snapshot (JSON)
    #[arg(short, long)]
    workspace: PathBuf,

    /// Neuron listing (JSON array) loaded into the workspace first
    #[arg(long)]
    neurons: Option<PathBuf>,

    /// Split/join state (JSON)
    #[arg(long)]
    state: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the changes that bring a rendered graph up to date
    Reconcile {
        #[command(flatten)]
        workspace: WorkspaceArgs,

        /// Connections (JSON array)
        #[arg(short, long)]
        connections: PathBuf,

        /// Currently rendered graph (JSON); defaults to an empty surface
        #[arg(long)]
        current: Option<PathBuf>,

        /// Groups shown expanded (comma-separated)
        #[arg(long, value_delimiter = ',')]
        open_groups: Vec<String>,

        /// Show neighbours as individual cells
        #[arg(long)]
        individuals: bool,

        /// Render annotation tags on edges
        #[arg(long)]
        annotations: bool,

        /// Exclude post-embryonic neurons
        #[arg(long)]
        no_post_embryonic: bool,

        /// Node coloring (cell-type, neurotransmitter)
        #[arg(long, value_parser = ColoringOption::from_str)]
        coloring: Option<ColoringOption>,
    },

    /// Split the selected classes into their cells
    Split {
        #[command(flatten)]
        workspace: WorkspaceArgs,
    },

    /// Join the selected cells back into their classes
    Join {
        #[command(flatten)]
        workspace: WorkspaceArgs,
    },

    /// Merge neurons into a new group
    Group {
        #[command(flatten)]
        workspace: WorkspaceArgs,

        /// Ids to group (comma-separated); defaults to the selection
        #[arg(long, value_delimiter = ',')]
        ids: Vec<String>,
    },

    /// Dissolve a group
    Ungroup {
        #[command(flatten)]
        workspace: WorkspaceArgs,

        /// Group ID
        group_id: String,
    },

    /// Walk the slice window
    Ring {
        /// Starting slice
        #[arg(long)]
        start: Option<i64>,

        /// Moves: '+' for next, '-' for previous
        #[arg(short, long, default_value = "")]
        moves: String,

        /// Jump to this slice after the moves
        #[arg(long)]
        goto: Option<i64>,

        #[arg(long)]
        capacity: Option<usize>,

        #[arg(long)]
        min: Option<i64>,

        #[arg(long)]
        max: Option<i64>,
    },

    /// Propagate a selection between viewers
    Sync {
        /// Initiating viewer (graph, 3d, em, instance-details)
        #[arg(short, long)]
        initiator: String,

        /// Replace the selection (comma-separated)
        #[arg(long, value_delimiter = ',')]
        select: Vec<String>,

        /// Add ids one at a time
        #[arg(long)]
        add: Vec<String>,

        /// Remove ids one at a time
        #[arg(long)]
        remove: Vec<String>,

        /// Clear the selection first
        #[arg(long)]
        clear: bool,

        /// Pairs to deactivate (graph-instance-details, graph-3d, 3d-em)
        #[arg(long, value_delimiter = ',')]
        inactive: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let manager = match &cli.config {
        Some(path) => ConfigManager::load_from(path),
        None => ConfigManager::load(),
    }
    .context("Failed to load configuration")?;

    init_tracing(&manager.config().logging, cli.verbose);

    match execute_command(&cli, manager.config()).await {
        Ok(output) => {
            print_output(&cli.output, &output)?;
            Ok(())
        }
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    }
}

/// `RUST_LOG` wins over the configured level. Logs go to stderr so JSON
/// output stays parseable.
fn init_tracing(logging: &LoggingConfig, verbose: bool) {
    let level = if verbose { "debug" } else { logging.level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);

    match logging.format.as_str() {
        "json" => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        "compact" => registry
            .with(tracing_subscriber::fmt::layer().compact().with_writer(std::io::stderr))
            .init(),
        _ => registry
            .with(tracing_subscriber::fmt::layer().pretty().with_writer(std::io::stderr))
            .init(),
    }
}

async fn execute_command(cli: &Cli, config: &ConnectomeConfig) -> Result<Value> {
    match &cli.command {
        Commands::Reconcile {
            workspace,
            connections,
            current,
            open_groups,
            individuals,
            annotations,
            no_post_embryonic,
            coloring,
        } => {
            let mut options = ReconcileOptions::from(&config.graph);
            options.include_neighboring_cells_as_individual_cells |= *individuals;
            options.include_annotations |= *annotations;
            if *no_post_embryonic {
                options.include_post_embryonic = false;
            }
            if let Some(coloring) = coloring {
                options.coloring = *coloring;
            }
            execute_reconcile(workspace, connections, current.as_deref(), open_groups, options)
        }
        Commands::Split { workspace } => {
            let (ws, state) = load_workspace(workspace)?;
            let outcome = split_selected(&ws, &state, config.graph.split_fanout_radius);
            let next = ws.apply(&outcome.update);
            Ok(json!({
                "state": outcome.state,
                "update": outcome.update,
                "selectedNeurons": next.selected_neurons,
            }))
        }
        Commands::Join { workspace } => {
            let (ws, state) = load_workspace(workspace)?;
            let outcome = join_selected(&ws, &state);
            let next = ws.apply(&outcome.update);
            Ok(json!({
                "state": outcome.state,
                "update": outcome.update,
                "selectedNeurons": next.selected_neurons,
            }))
        }
        Commands::Group { workspace, ids } => {
            let (ws, _) = load_workspace(workspace)?;
            let selection: BTreeSet<String> = if ids.is_empty() {
                ws.selected_neurons.clone()
            } else {
                ids.iter().cloned().collect()
            };
            let outcome = group_selected(&ws, &selection)?;
            let next = ws.apply(&outcome.update);
            Ok(json!({
                "groupId": outcome.group_id,
                "update": outcome.update,
                "groups": next.neuron_groups,
            }))
        }
        Commands::Ungroup {
            workspace,
            group_id,
        } => {
            let (ws, _) = load_workspace(workspace)?;
            let update = ungroup(&ws, group_id)?;
            let next = ws.apply(&update);
            Ok(json!({
                "update": update,
                "selectedNeurons": next.selected_neurons,
            }))
        }
        Commands::Ring {
            start,
            moves,
            goto,
            capacity,
            min,
            max,
        } => {
            let ring = &config.ring;
            let options = RingOptions {
                capacity: capacity.unwrap_or(ring.capacity),
                extent: (min.unwrap_or(ring.min), max.unwrap_or(ring.max)),
                start_at: start.unwrap_or(ring.start_at),
            };
            execute_ring(options, moves, *goto, ring.settle_ms).await
        }
        Commands::Sync {
            initiator,
            select,
            add,
            remove,
            clear,
            inactive,
        } => {
            let initiator: ViewerType = initiator.parse().map_err(anyhow::Error::msg)?;
            let mut sync = SyncOrchestrator::from_config(&config.sync);
            for pair in inactive {
                let pair: SynchronizerPair = pair.parse().map_err(anyhow::Error::msg)?;
                sync.set_active(pair, false);
            }

            if *clear {
                sync.clear(initiator);
            }
            if !select.is_empty() {
                sync.select(select, initiator);
            }
            for id in add {
                sync.select_one(id, initiator);
            }
            for id in remove {
                sync.unselect_one(id, initiator);
            }

            let pairs: serde_json::Map<String, Value> = sync
                .synchronizers()
                .iter()
                .map(|s| (s.pair().to_string(), Value::Bool(s.is_active())))
                .collect();
            let contexts: serde_json::Map<String, Value> = sync
                .contexts()
                .iter()
                .map(|(viewer, ids)| (viewer.to_string(), json!(ids)))
                .collect();
            Ok(json!({ "pairs": pairs, "contexts": contexts }))
        }
    }
}

fn execute_reconcile(
    workspace: &WorkspaceArgs,
    connections: &Path,
    current: Option<&Path>,
    open_groups: &[String],
    options: ReconcileOptions,
) -> Result<Value> {
    let (ws, state) = load_workspace(workspace)?;
    let connections: Vec<Connection> = read_json(connections)?;
    let hidden = ws.hidden_neurons();
    let open: BTreeSet<String> = open_groups.iter().cloned().collect();

    let reconciler = GraphReconciler::new(options);
    let input = ReconcileInput::new(&ws, &connections)
        .with_split_join(&state)
        .with_hidden(&hidden)
        .with_open_groups(&open);

    let diff = match current {
        Some(path) => {
            let mut surface: RenderedGraph = read_json(path)?;
            reconciler.sync_surface(&mut surface, &input)
        }
        None => reconciler.reconcile(&input),
    };
    info!(
        connections = connections.len(),
        empty = diff.is_empty(),
        "reconciliation finished"
    );
    Ok(serde_json::to_value(diff)?)
}

async fn execute_ring(
    options: RingOptions,
    moves: &str,
    goto: Option<i64>,
    settle_ms: u64,
) -> Result<Value> {
    let mut ring = SlidingRing::new(
        options,
        ClosureCallbacks {
            on_push: |n: i64| format!("slice-{}", n),
            on_selected: |n: i64, _: &String| debug!(slice = n, "slice selected"),
            on_unselected: |n: i64, _: &String| trace!(slice = n, "slice unselected"),
            on_evict: |n: i64, _: String| trace!(slice = n, "slice evicted"),
        },
    )?;
    let mut settle = SettleScheduler::from_millis(settle_ms);

    let mut steps = vec![json!({
        "move": "start",
        "selected": ring.selected(),
        "window": ring.debug_string(),
    })];

    for step in moves.chars() {
        let moved = match step {
            '+' => ring.next(),
            '-' => ring.prev(),
            c if c.is_whitespace() => continue,
            other => bail!("unknown move '{}', expected '+' or '-'", other),
        };
        ring.trace_window();

        let selected = ring.selected();
        settle.schedule(move || info!(slice = selected, "slice stack settled"))?;
        steps.push(json!({
            "move": step.to_string(),
            "moved": moved,
            "selected": selected,
            "window": ring.debug_string(),
        }));
    }

    if let Some(n) = goto {
        ring.goto(n)?;
        steps.push(json!({
            "move": format!("goto {}", n),
            "moved": true,
            "selected": ring.selected(),
            "window": ring.debug_string(),
        }));
    }

    if settle.is_pending() {
        tokio::time::sleep(settle.delay() * 2).await;
    }

    Ok(json!({
        "capacity": ring.capacity(),
        "extent": [ring.extent().0, ring.extent().1],
        "held": ring.held_positions(),
        "steps": steps,
    }))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))
}

fn load_workspace(args: &WorkspaceArgs) -> Result<(Workspace, SplitJoinState)> {
    let mut workspace: Workspace = read_json(&args.workspace)?;
    if let Some(path) = &args.neurons {
        let neurons: Vec<Neuron> = read_json(path)?;
        workspace = workspace.load_neurons(neurons);
    }
    let state = match &args.state {
        Some(path) => read_json(path)?,
        None => SplitJoinState::new(),
    };
    Ok((workspace, state))
}

fn print_output(format: &OutputFormat, value: &Value) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(value)?);
        }
        OutputFormat::Pretty => {
            print_pretty(value, 0)?;
        }
    }
    Ok(())
}

fn print_pretty(value: &Value, depth: usize) -> Result<()> {
    let indent = "  ".repeat(depth);
    match value {
        Value::Object(map) => {
            for (key, val) in map {
                let key_colored = key.cyan().bold();
                match val {
                    Value::String(s) => {
                        println!("{}{}: {}", indent, key_colored, s.green());
                    }
                    Value::Number(n) => {
                        println!("{}{}: {}", indent, key_colored, n.to_string().yellow());
                    }
                    Value::Bool(b) => {
                        let val_colored = if *b { "true".green() } else { "false".red() };
                        println!("{}{}: {}", indent, key_colored, val_colored);
                    }
                    Value::Array(items) if items.iter().all(|i| !i.is_object()) => {
                        let rendered: Vec<String> = items
                            .iter()
                            .map(|i| match i {
                                Value::String(s) => s.clone(),
                                other => other.to_string(),
                            })
                            .collect();
                        println!("{}{}: [{}]", indent, key_colored, rendered.join(", "));
                    }
                    _ => {
                        println!("{}{}:", indent, key_colored);
                        print_pretty(val, depth + 1)?;
                    }
                }
            }
        }
        Value::Array(arr) => {
            for (i, item) in arr.iter().enumerate() {
                println!("{}{}{}:", indent, "Item ".cyan(), (i + 1).to_string().yellow());
                print_pretty(item, depth + 1)?;
            }
        }
        _ => {
            println!("{}{}", indent, serde_json::to_string_pretty(value)?);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn coloring_parses_through_the_option_type() {
        let cli = Cli::try_parse_from([
            "connectome",
            "reconcile",
            "--workspace",
            "ws.json",
            "--connections",
            "conns.json",
            "--coloring",
            "Neurotransmitter",
        ])
        .unwrap();
        match cli.command {
            Commands::Reconcile { coloring, .. } => {
                assert_eq!(coloring, Some(ColoringOption::Neurotransmitter));
            }
            _ => panic!("expected the reconcile command"),
        }

        let bad = Cli::try_parse_from([
            "connectome",
            "reconcile",
            "--workspace",
            "ws.json",
            "--connections",
            "conns.json",
            "--coloring",
            "rainbow",
        ]);
        assert!(bad.is_err());
    }
}
