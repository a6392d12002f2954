//! Warden CLI.
//!
//! Commands:
//! - `init`         Write a default config file
//! - `route`        Route a request against a tool registry
//! - `embed`        Show the embedding of a text
//! - `memory`       Store, recall, and inspect memories
//! - `rules check`  Validate safety and consolidation rules
//! - `consolidate`  Run consolidation sweeps over entries from a file
//! - `doctor`       Diagnose configuration and backend health

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "warden",
    about = "Warden: safety-aware tool routing and hierarchical memory",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit structured JSON logs
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write ~/.warden/config.toml with default settings
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// Decide whether a request may be dispatched to a tool
    Route {
        /// The free-text request
        input: String,

        /// Tool registry file (.toml or .json); defaults to `registry_path`
        #[arg(short, long)]
        registry: Option<String>,

        /// Print the decision as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the hash embedding of a text
    Embed {
        text: String,

        /// Override the configured dimension
        #[arg(short, long)]
        dimension: Option<usize>,
    },

    /// Memory operations
    Memory {
        #[command(subcommand)]
        action: MemoryCommands,

        /// Use an in-process vector store instead of Qdrant
        #[arg(long, global = true)]
        offline: bool,
    },

    /// Rule management
    Rules {
        #[command(subcommand)]
        action: RulesCommands,
    },

    /// Load short-term entries from a JSON file and run one consolidation sweep
    Consolidate {
        /// JSON array of `{ "key", "content", "metadata" }` objects
        #[arg(short, long)]
        input: String,

        /// Consolidation rules file (`[[rules]]` TOML); defaults to config
        #[arg(long)]
        rules: Option<String>,

        /// Use an in-process vector store instead of Qdrant
        #[arg(long)]
        offline: bool,

        /// Keep sweeping every `consolidation.interval_secs` until Ctrl+C
        #[arg(short, long)]
        watch: bool,
    },

    /// Diagnose configuration and backend health
    Doctor,
}

#[derive(Subcommand)]
enum MemoryCommands {
    /// Store a memory
    Store {
        content: String,

        /// Key (a random one is generated when omitted)
        #[arg(short, long)]
        key: Option<String>,

        /// short-term, long-term, or episodic
        #[arg(short, long, default_value = "long-term")]
        layer: String,

        /// Metadata as a JSON object
        #[arg(short, long)]
        metadata: Option<String>,
    },

    /// Search memories
    Recall {
        query: String,

        /// Restrict to one layer
        #[arg(short, long)]
        layer: Option<String>,

        /// Maximum results (defaults to `memory.recall_limit`)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// Show memory statistics and backend status
    Stats,
}

#[derive(Subcommand)]
enum RulesCommands {
    /// Compile safety rules and consolidation rules
    Check {
        /// Validate a consolidation rules file instead of the configured rules
        #[arg(short, long)]
        file: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "warn" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    if cli.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .init();
    }

    match cli.command {
        Commands::Init { force } => commands::init::run(force).await?,
        Commands::Route {
            input,
            registry,
            json,
        } => commands::route::run(&input, registry.as_deref(), json).await?,
        Commands::Embed { text, dimension } => commands::embed::run(&text, dimension).await?,
        Commands::Memory { action, offline } => match action {
            MemoryCommands::Store {
                content,
                key,
                layer,
                metadata,
            } => {
                commands::memory::store(&content, key, &layer, metadata.as_deref(), offline).await?
            }
            MemoryCommands::Recall {
                query,
                layer,
                limit,
            } => commands::memory::recall(&query, layer.as_deref(), limit, offline).await?,
            MemoryCommands::Stats => commands::memory::stats(offline).await?,
        },
        Commands::Rules { action } => match action {
            RulesCommands::Check { file } => commands::rules::check(file.as_deref()).await?,
        },
        Commands::Consolidate {
            input,
            rules,
            offline,
            watch,
        } => commands::consolidate::run(&input, rules.as_deref(), offline, watch).await?,
        Commands::Doctor => commands::doctor::run().await?,
    }

    Ok(())
}
