//! PromptScaffold CLI — the main entry point.
//!
//! Commands:
//! - `analyze`   — Break a prompt into its 7-slot scaffold
//! - `render`    — Analyze and render through one or more templates
//! - `generate`  — Full pipeline: analyze, enrich, merge, render
//! - `templates` — List built-in and custom templates
//! - `formats`   — Manage custom formats
//! - `sync`      — Push/pull user data to the remote store
//! - `config`    — Show or initialize configuration

use clap::{Parser, Subcommand};
use promptscaffold_core::LifecycleManager;

mod commands;

#[derive(Parser)]
#[command(
    name = "promptscaffold",
    about = "PromptScaffold — structured prompts for image generation models",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Break a prompt into its 7-slot scaffold
    Analyze {
        /// The prompt text
        text: String,

        /// Print the scaffold as JSON
        #[arg(long)]
        json: bool,
    },

    /// Analyze a prompt and render it through templates
    Render {
        /// The prompt text
        text: String,

        /// Template id (built-in or custom format id); repeatable
        #[arg(short, long = "template")]
        templates: Vec<String>,

        /// Render an ad-hoc template body instead
        #[arg(long, conflicts_with = "templates")]
        body: Option<String>,
    },

    /// Run the full pipeline, with enrichment when an API key is set
    Generate {
        /// The prompt text
        text: String,

        /// Reference image file; repeatable
        #[arg(short, long = "image")]
        images: Vec<std::path::PathBuf>,

        /// Template id; repeatable (defaults to output.templates)
        #[arg(short, long = "template")]
        templates: Vec<String>,

        /// Answer for a slot, as CODE=VALUE (e.g. L="golden hour"); repeatable
        #[arg(short, long = "answer")]
        answers: Vec<String>,

        /// Skip the enrichment API
        #[arg(long)]
        no_enhance: bool,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// List available templates
    Templates,

    /// Manage custom formats
    Formats {
        #[command(subcommand)]
        action: FormatAction,
    },

    /// Synchronize user data with the remote store
    Sync {
        #[command(subcommand)]
        action: SyncAction,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum FormatAction {
    /// List custom formats
    List,
    /// Create a custom format
    Add { name: String, template: String },
    /// Delete a custom format by id
    Delete { id: String },
    /// Copy a custom format
    Duplicate {
        id: String,
        /// Name for the copy (defaults to "<name> (Copy)")
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Import formats from a JSON file
    Import { file: std::path::PathBuf },
    /// Export formats as JSON
    Export {
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<std::path::PathBuf>,
    },
    /// Search formats by name or template
    Search { query: String },
    /// Check a template without saving it
    Validate { template: String },
}

#[derive(Subcommand)]
enum SyncAction {
    /// Upload local data to the remote store
    Push,
    /// Replace local data with the remote copy
    Pull,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Print the config file path
    Path,
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let lifecycle = LifecycleManager::new();

    match cli.command {
        Commands::Analyze { text, json } => commands::analyze::analyze(&text, json).await?,
        Commands::Render {
            text,
            templates,
            body,
        } => commands::analyze::render(&text, &templates, body.as_deref(), &lifecycle).await?,
        Commands::Generate {
            text,
            images,
            templates,
            answers,
            no_enhance,
            json,
        } => {
            let options = commands::generate::GenerateOptions {
                images,
                templates,
                answers,
                enhance: !no_enhance,
                json,
            };
            commands::generate::run(&text, options, &lifecycle).await?
        }
        Commands::Templates => commands::formats::templates(&lifecycle).await?,
        Commands::Formats { action } => match action {
            FormatAction::List => commands::formats::list(&lifecycle).await?,
            FormatAction::Add { name, template } => {
                commands::formats::add(&name, &template, &lifecycle).await?
            }
            FormatAction::Delete { id } => commands::formats::delete(&id, &lifecycle).await?,
            FormatAction::Duplicate { id, name } => {
                commands::formats::duplicate(&id, name.as_deref(), &lifecycle).await?
            }
            FormatAction::Import { file } => commands::formats::import(&file, &lifecycle).await?,
            FormatAction::Export { output } => {
                commands::formats::export(output.as_deref(), &lifecycle).await?
            }
            FormatAction::Search { query } => commands::formats::search(&query, &lifecycle).await?,
            FormatAction::Validate { template } => commands::formats::validate(&template).await?,
        },
        Commands::Sync { action } => match action {
            SyncAction::Push => commands::sync::push(&lifecycle).await?,
            SyncAction::Pull => commands::sync::pull(&lifecycle).await?,
        },
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show().await?,
            ConfigAction::Path => commands::config_cmd::path().await?,
            ConfigAction::Init { force } => commands::config_cmd::init(force).await?,
        },
    }

    lifecycle.dispose();
    Ok(())
}
