use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use vfxgraph::{CompileTarget, GraphDoc, ReducedGraphReport, ReductionConfig};

#[derive(Parser, Debug)]
#[command(name = "vfxgraph", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate a graph document and type-check every node.
    Check(CheckArgs),
    /// Compile every root of a graph and print (or write) the reduced graph report.
    Reduce(ReduceArgs),
}

#[derive(Parser, Debug)]
struct CheckArgs {
    /// Input graph JSON.
    #[arg(long = "in")]
    in_path: PathBuf,
}

#[derive(Parser, Debug)]
struct ReduceArgs {
    /// Input graph JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Reduction config JSON (options and event attribute layout).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Option preset; replaces the options of `--config` when both are given.
    #[arg(long, value_enum)]
    target: Option<CompileTarget>,

    /// Output report path. Printed to stdout when omitted.
    #[arg(long)]
    out: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Check(args) => cmd_check(args),
        Command::Reduce(args) => cmd_reduce(args),
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path, what: &str) -> anyhow::Result<T> {
    let f = File::open(path).with_context(|| format!("open {what} '{}'", path.display()))?;
    let r = BufReader::new(f);
    serde_json::from_reader(r).with_context(|| format!("parse {what} JSON"))
}

fn cmd_check(args: CheckArgs) -> anyhow::Result<()> {
    let doc: GraphDoc = read_json(&args.in_path, "graph")?;
    let built = doc.build()?;
    eprintln!(
        "ok: {} nodes, {} roots",
        built.graph.len(),
        built.roots.len()
    );
    Ok(())
}

fn cmd_reduce(args: ReduceArgs) -> anyhow::Result<()> {
    let doc: GraphDoc = read_json(&args.in_path, "graph")?;
    let mut built = doc.build()?;

    let mut config = match &args.config {
        Some(path) => read_json::<ReductionConfig>(path, "reduction config")?,
        None => ReductionConfig::for_target(CompileTarget::Cpu),
    };
    if let Some(target) = args.target {
        config.options = target.options();
    }

    let mut ctx = config.into_context()?;
    for &root in &built.roots {
        ctx.register_expression(root);
    }
    ctx.compile_all(&mut built.graph)
        .context("compile expression context")?;

    let report = ReducedGraphReport::collect(&built, &ctx)?;
    match &args.out {
        Some(out) => {
            if let Some(parent) = out.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("create output dir '{}'", parent.display()))?;
            }
            let f = File::create(out)
                .with_context(|| format!("create report '{}'", out.display()))?;
            serde_json::to_writer_pretty(f, &report)
                .with_context(|| format!("write report '{}'", out.display()))?;
            eprintln!("wrote {}", out.display());
        }
        None => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}
