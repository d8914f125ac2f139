use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use weftcore::PipelineEvent;
use weftnodes::{standard_library, standard_registry};
use weftruntime::{EvaluationConfig, Pipeline, PipelineCompiler};

#[derive(Parser)]
#[command(name = "weft")]
#[command(about = "Weft pipeline engine CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile and execute a pipeline file
    Run {
        /// Path to pipeline JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// Show verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Validate a pipeline file and print every diagnostic
    Validate {
        /// Path to pipeline JSON file
        file: PathBuf,
    },

    /// List registered operations
    Ops,

    /// Create a new example pipeline
    Init {
        /// Output file path
        #[arg(short, long, default_value = "pipeline.json")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { file, verbose } => {
            init_tracing(verbose);
            run_pipeline(file).await?;
        }
        Commands::Validate { file } => {
            validate_pipeline(file)?;
        }
        Commands::Ops => {
            list_operations();
        }
        Commands::Init { output } => {
            create_example_pipeline(output)?;
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .init();
}

fn compile_file(file: &PathBuf) -> Result<Pipeline> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("cannot read {}", file.display()))?;
    let graph: serde_json::Value =
        serde_json::from_str(&raw).with_context(|| format!("{} is not JSON", file.display()))?;

    let registry = standard_registry();
    let result = PipelineCompiler::new(&registry).compile(&graph);
    match result.into_pipeline() {
        Ok(pipeline) => Ok(pipeline),
        Err(errors) => {
            for error in &errors {
                println!("  ❌ {error}");
            }
            bail!("{} compile error(s)", errors.len());
        }
    }
}

async fn run_pipeline(file: PathBuf) -> Result<()> {
    println!("🚀 Loading pipeline from: {}", file.display());
    let pipeline = compile_file(&file)?;
    println!(
        "📋 Compiled: {} nodes, entrypoints: {}",
        pipeline.len(),
        pipeline.entrypoints().join(", ")
    );
    println!();

    let evaluation = pipeline.create_evaluation(standard_library(), EvaluationConfig::default());
    let mut events = evaluation.events();

    let event_task = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                PipelineEvent::ThreadStarted { entrypoint, .. } => {
                    println!("▶️  Thread started: {entrypoint}");
                }
                PipelineEvent::NodeStarted { node, operation, .. } => {
                    println!("  ⚡ {node} ({operation})");
                }
                PipelineEvent::NodeCompleted { node, .. } => {
                    println!("  ✅ {node}");
                }
                PipelineEvent::NodeFailed { node, error, .. } => {
                    println!("  ❌ {node}: {error}");
                }
                PipelineEvent::NodeSkipped { node, gate_node, gate_output, .. } => {
                    println!("  ⏭️  {node} (gate {gate_node}.{gate_output} is false)");
                }
                PipelineEvent::NodeMessage { node, message, .. } => {
                    println!("     ℹ️  [{node}] {message}");
                }
                PipelineEvent::ThreadCompleted { entrypoint, .. } => {
                    println!("✨ Thread completed: {entrypoint}");
                }
                PipelineEvent::ThreadFailed { entrypoint, error, .. } => {
                    println!("💥 Thread failed: {entrypoint}: {error}");
                }
                _ => {}
            }
        }
    });

    let signal = CancellationToken::new();
    let ctrl_c = signal.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let threads = evaluation.evaluate_to_end(signal).await;

    // Let the listener drain before summarizing
    tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    event_task.abort();

    println!();
    println!("📊 Summary:");
    let mut failures = 0;
    for thread in threads {
        let entrypoint = thread.entrypoint.clone();
        match thread.into_result() {
            Ok(outputs) => {
                println!("   {entrypoint}: ok");
                for (node, values) in &outputs {
                    if values.is_empty() {
                        continue;
                    }
                    println!("     {node}:");
                    for (name, value) in values {
                        println!("       {name}: {value}");
                    }
                }
            }
            Err(error) => {
                println!("   {entrypoint}: {error}");
                failures += 1;
            }
        }
    }

    if failures > 0 {
        bail!("{failures} thread(s) failed");
    }
    Ok(())
}

fn validate_pipeline(file: PathBuf) -> Result<()> {
    println!("🔍 Validating pipeline: {}", file.display());
    let pipeline = compile_file(&file)?;

    println!("✅ Pipeline is valid:");
    println!("   Nodes: {}", pipeline.len());
    println!("   Entrypoints: {}", pipeline.entrypoints().join(", "));
    Ok(())
}

fn list_operations() {
    println!("📦 Registered operations:");
    println!();

    for signature in standard_registry().signatures() {
        println!("  • {} ({})", signature.tag(), signature.title_str());
        for input in signature.inputs() {
            let optional = if input.optional { ", optional" } else { "" };
            println!("      in  {}: {}{}", input.name, input.ref_type, optional);
        }
        for output in signature.outputs() {
            println!("      out {}: {}", output.name, output.ref_type);
        }
    }
}

fn create_example_pipeline(output: PathBuf) -> Result<()> {
    let example = json!({
        "counter": {
            "node": "declare::number",
            "inputs": { "value": { "type": "constant", "value": 10 } },
            "outputs": { "value": "value" },
            "dependsOn": []
        },
        "decrement": {
            "node": "logic::subtract",
            "inputs": {
                "a": { "type": "outputOf", "nodeName": "counter", "outputName": "value" },
                "b": { "type": "constant", "value": 1 }
            },
            "outputs": { "result": { "nodeName": "counter", "inputName": "value" } },
            "dependsOn": ["counter", "loop"]
        },
        "check": {
            "node": "logic::greaterThanOrEqual",
            "inputs": {
                "a": { "type": "outputOf", "nodeName": "decrement", "outputName": "result" },
                "b": { "type": "constant", "value": 0 }
            },
            "outputs": { "result": "result" },
            "dependsOn": "decrement"
        },
        "loop": {
            "node": "log::info",
            "inputs": { "message": { "type": "constant", "value": "Test" } },
            "outputs": {},
            "dependsOn": [{ "nodeName": "check", "outputName": "result" }]
        }
    });

    std::fs::write(&output, serde_json::to_string_pretty(&example)?)
        .with_context(|| format!("cannot write {}", output.display()))?;
    println!("📝 Wrote example pipeline to {}", output.display());
    println!("   Try: weft run -f {}", output.display());
    Ok(())
}
