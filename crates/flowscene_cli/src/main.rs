// SPDX-License-Identifier: MIT OR Apache-2.0
//! `flowscene` command-line tool.
//!
//! Loads, checks and writes scene documents using the calculator node set.
//! All file I/O lives here; the graph crate only works on in-memory documents.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use egui::Pos2;
use flowscene_graph::graphs::calculator::{
    create_calculator_registry, AdditionModel, IntegerDisplayModel, NumberDisplayModel, NumberSourceModel,
};
use flowscene_graph::{
    dependency_order, ConnectOutcome, DataFlowModel, DraggedConnection, FlowSceneModel, GeometryConfig,
    NodeConnectionInteraction, NodeGeometry, PortDirection, PortLocator, SceneDocument,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "flowscene", about = "Inspect, convert and generate flowscene documents")]
struct Cli {
    /// Node layout overrides (RON)
    #[arg(long, global = true)]
    geometry: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a document and print its nodes and connections
    Inspect(InspectArgs),
    /// Rewrite a document in another format
    Convert(ConvertArgs),
    /// Write a small calculator graph
    Demo(DemoArgs),
}

#[derive(Args)]
struct InspectArgs {
    /// Document to read (`.json` or `.ron`)
    input: PathBuf,
}

#[derive(Args)]
struct ConvertArgs {
    /// Document to read
    input: PathBuf,
    /// Document to write; the extension picks the format
    output: PathBuf,
}

#[derive(Args)]
struct DemoArgs {
    /// Where to write the graph; printed as JSON when omitted
    #[arg(long)]
    output: Option<PathBuf>,
}

/// Text form of a document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Json,
    Ron,
}

impl Format {
    fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Ok(Self::Json),
            Some(ext) if ext.eq_ignore_ascii_case("ron") => Ok(Self::Ron),
            _ => bail!("cannot tell the format of {}: expected .json or .ron", path.display()),
        }
    }

    fn parse(self, text: &str) -> Result<SceneDocument> {
        let document = match self {
            Self::Json => SceneDocument::from_json(text)?,
            Self::Ron => SceneDocument::from_ron(text)?,
        };
        Ok(document)
    }

    fn write(self, document: &SceneDocument) -> Result<String> {
        let text = match self {
            Self::Json => document.to_json()?,
            Self::Ron => document.to_ron()?,
        };
        Ok(text)
    }
}

fn main() -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("flowscene=info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();
    let geometry = load_geometry(cli.geometry.as_deref())?;

    match cli.command {
        Commands::Inspect(args) => run_inspect(&args),
        Commands::Convert(args) => run_convert(&args),
        Commands::Demo(args) => run_demo(&args, &geometry),
    }
}

fn load_geometry(path: Option<&Path>) -> Result<NodeGeometry> {
    let Some(path) = path else {
        return Ok(NodeGeometry::default());
    };
    let text = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let config = GeometryConfig::from_ron(&text).with_context(|| format!("invalid geometry in {}", path.display()))?;
    tracing::info!("Using node geometry from {}", path.display());
    Ok(NodeGeometry::new(config))
}

fn read_document(path: &Path) -> Result<SceneDocument> {
    let format = Format::from_path(path)?;
    let text = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    format
        .parse(&text)
        .with_context(|| format!("failed to parse {}", path.display()))
}

fn write_document(path: &Path, document: &SceneDocument) -> Result<()> {
    let text = Format::from_path(path)?.write(document)?;
    std::fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))?;
    tracing::info!("Wrote {}", path.display());
    Ok(())
}

/// Restore a document into a fresh calculator graph
fn load_graph(document: &SceneDocument) -> Result<DataFlowModel> {
    let mut model = DataFlowModel::new(Arc::new(create_calculator_registry()));
    model
        .restore(document)
        .context("document does not fit the calculator node set")?;
    Ok(model)
}

fn run_inspect(args: &InspectArgs) -> Result<()> {
    let model = load_graph(&read_document(&args.input)?)?;

    println!("{} nodes, {} connections", model.node_count(), model.connection_count());
    for node in model.nodes() {
        let id = node.id();
        let position = node.position();
        println!(
            "  {id}  {:<18} ({:>7.1}, {:>7.1})  {:?}  {}",
            node.model().name(),
            position.x,
            position.y,
            node.model().validation_state(),
            model.node_caption(id).unwrap_or_default()
        );
    }
    for connection in model.connections() {
        println!("  {}", connection.id());
    }

    match dependency_order(&model) {
        Ok(order) => {
            let names: Vec<String> = order
                .iter()
                .filter_map(|id| model.node_type_identifier(*id))
                .collect();
            println!("order: {}", names.join(" -> "));
        }
        Err(err) => println!("order: {err}"),
    }
    Ok(())
}

fn run_convert(args: &ConvertArgs) -> Result<()> {
    let document = read_document(&args.input)?;
    // reject documents that would not load
    load_graph(&document)?;
    write_document(&args.output, &document)
}

/// Two numbers summed into a display, plus an integer display wired
/// through an automatically inserted converter
fn build_demo(geometry: &NodeGeometry) -> Result<DataFlowModel> {
    let mut model = DataFlowModel::new(Arc::new(create_calculator_registry()));

    let mut lhs = NumberSourceModel::default();
    let _ = lhs.set_number(2.5);
    let lhs = model.add_node_with_model(Box::new(lhs), Pos2::new(0.0, 0.0));
    let mut rhs = NumberSourceModel::default();
    let _ = rhs.set_number(4.0);
    let rhs = model.add_node_with_model(Box::new(rhs), Pos2::new(0.0, 120.0));

    let sum = model.add_node(AdditionModel::NAME, Pos2::new(260.0, 60.0))?;
    let display = model.add_node(NumberDisplayModel::NAME, Pos2::new(520.0, 0.0))?;
    let truncated = model.add_node(IntegerDisplayModel::NAME, Pos2::new(780.0, 160.0))?;

    model.add_connection(lhs, 0, sum, 0)?;
    model.add_connection(rhs, 0, sum, 1)?;
    model.add_connection(sum, 0, display, 0)?;

    // drop a wire from the sum onto the integer display like an editor would
    let target = geometry
        .port_scene_position(&model, truncated, PortDirection::In, 0)
        .context("integer display has no input port")?;
    let drag = DraggedConnection::from_port(sum, PortDirection::Out, 0, target);
    match NodeConnectionInteraction::new(truncated, &drag, geometry).try_connect(&mut model, target)? {
        ConnectOutcome::Converted {
            converter,
            upstream: Some(_),
            downstream: Some(_),
        } => tracing::info!("Inserted converter node {converter}"),
        outcome => bail!("unexpected connection result: {outcome:?}"),
    }

    Ok(model)
}

fn run_demo(args: &DemoArgs, geometry: &NodeGeometry) -> Result<()> {
    let document = build_demo(geometry)?.save();
    match &args.output {
        Some(path) => write_document(path, &document),
        None => {
            println!("{}", document.to_json()?);
            Ok(())
        }
    }
}
