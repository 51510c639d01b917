//! nl2sql command line front end
//!
//! ```text
//! nl2sql generate "统计订单数量" --schema schema.json
//! nl2sql explain "按金额降序排序前10条" --schema schema.json --profile chinese
//! ```

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use nl2sql::{Pipeline, PipelineConfig, SchemaInfo};

#[derive(Parser)]
#[command(name = "nl2sql")]
#[command(about = "Compile natural-language questions into parameterized SQL")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the generation result as JSON
    Generate(QuestionArgs),

    /// Print every stage's output
    Explain(QuestionArgs),
}

#[derive(Args)]
struct QuestionArgs {
    /// The question in Chinese or English
    question: String,

    /// Schema snapshot (JSON)
    #[arg(short, long)]
    schema: PathBuf,

    /// Pipeline config (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Normalizer profile: default, sql-aware, chinese, exact-match
    #[arg(long)]
    profile: Option<String>,

    /// Tokenizer language: zh, en, auto
    #[arg(long)]
    language: Option<String>,
}

fn build_pipeline(args: &QuestionArgs) -> Result<(Pipeline, SchemaInfo)> {
    let config = match &args.config {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    let config = config
        .with_env_overrides()?
        .with_overrides(args.profile.as_deref(), args.language.as_deref())?;

    let schema = SchemaInfo::load(&args.schema)
        .with_context(|| format!("reading schema {}", args.schema.display()))?;
    info!("Loaded schema '{}' with {} tables", schema.data_source_id, schema.tables.len());

    Ok((Pipeline::new(config)?, schema))
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Generate(args) => {
            let (pipeline, schema) = build_pipeline(&args)?;
            let result = pipeline.run(&args.question, &schema);
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Explain(args) => {
            let (pipeline, schema) = build_pipeline(&args)?;
            let trace = pipeline.trace(&args.question, &schema)?;

            println!("=== Normalized ({:?}) ===", trace.normalized.language);
            println!("{}", trace.normalized.normalized);

            println!("\n=== Tokens ===");
            for token in &trace.tokens {
                println!("  [{}..{}) {:?} {}", token.start, token.end, token.kind, token.text);
            }

            println!("\n=== Intent ===");
            println!("{}", serde_json::to_string_pretty(&trace.intent)?);

            println!("\n=== Entities ===");
            for entity in &trace.entities {
                println!(
                    "  [{}..{}) {:?} '{}' → {} ({:.2}, {:?})",
                    entity.start_offset,
                    entity.end_offset,
                    entity.entity_type,
                    entity.text,
                    entity.value(),
                    entity.confidence,
                    entity.source
                );
            }

            println!("\n=== SQL ===");
            if trace.result.sql.is_empty() {
                println!("(none)");
            } else {
                println!("{}", trace.result.sql);
            }
            for (name, value) in trace.result.parameters.iter() {
                println!("  {} = {}", name, value);
            }
            println!("confidence: {:.3}", trace.result.confidence);
            for explanation in &trace.result.explanations {
                println!("  - {}", explanation);
            }
            for alternative in &trace.result.alternative_sqls {
                println!("  alt: {}", alternative);
            }
        }
    }

    Ok(())
}
