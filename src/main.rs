use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use codeindex::cli::{self, query::QueryType, OutputFormat};
use codeindex::config::{Config, LoggingConfig};

#[derive(Parser)]
#[command(name = "codeindex")]
#[command(author = "Intent Project Team")]
#[command(version)]
#[command(about = "Incremental code index with call graph analytics, served to AI agents via MCP", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only print errors; hides progress bars
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build or refresh the index of a project
    Index {
        /// Project directory to index
        #[arg(short, long, default_value = ".")]
        project: String,

        /// Update an existing index; fails when there is none
        #[arg(short, long, conflicts_with = "rebuild")]
        update: bool,

        /// Rebuild the entire index
        #[arg(short, long)]
        rebuild: bool,

        /// Watch for changes after indexing
        #[arg(short, long)]
        watch: bool,
    },

    /// Query the index
    Query {
        #[arg(value_enum)]
        query_type: QueryType,

        /// Symbol key (file:qualified.name), qualified name or bare name
        target: String,

        /// Project directory
        #[arg(short, long, default_value = ".")]
        project: String,

        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Analyze the impact of changing a file
    Impact {
        /// File path relative to the project root
        file: String,

        /// Project directory
        #[arg(short, long, default_value = ".")]
        project: String,

        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Files most likely to change together with a file
    Coupling {
        /// File path relative to the project root
        file: String,

        /// Project directory
        #[arg(short, long, default_value = ".")]
        project: String,

        /// Maximum number of partners
        #[arg(short, long, default_value_t = 5)]
        limit: usize,

        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show index statistics
    Stats {
        /// Project directory
        #[arg(short, long, default_value = ".")]
        project: String,

        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Check whether the index is behind the working tree (exit code 1 when stale)
    Check {
        /// Project directory
        #[arg(short, long, default_value = ".")]
        project: String,

        /// Use git history instead of re-hashing files
        #[arg(short, long)]
        git: bool,

        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Start the MCP server (stdio)
    Serve {
        /// Project directory
        #[arg(short, long, default_value = ".")]
        project: String,

        /// Keep the index current while serving
        #[arg(short, long)]
        watch: bool,
    },

    /// List supported languages
    Languages,
}

impl Commands {
    fn project(&self) -> &str {
        match self {
            Commands::Index { project, .. }
            | Commands::Query { project, .. }
            | Commands::Impact { project, .. }
            | Commands::Coupling { project, .. }
            | Commands::Stats { project, .. }
            | Commands::Check { project, .. }
            | Commands::Serve { project, .. } => project,
            Commands::Languages => ".",
        }
    }
}

/// Logs go to stderr; stdout carries command output and MCP responses.
/// `RUST_LOG` wins over flags, flags win over the project config.
fn init_logging(cli: &Cli, logging: &LoggingConfig) {
    let level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else if cli.quiet {
        "error"
    } else {
        logging.level.as_str()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    match logging.format.as_str() {
        "json" => builder.json().init(),
        "compact" => builder.compact().init(),
        _ => builder.pretty().init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::from_project_dir(cli.command.project());
    init_logging(&cli, &config.logging);

    info!("codeindex v{} starting...", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Index {
            project,
            update,
            rebuild,
            watch,
        } => {
            info!("Indexing project: {}", project);
            cli::index::index_project(project, update, rebuild, watch, cli.quiet).await?;
        }

        Commands::Query {
            query_type,
            target,
            project,
            format,
        } => {
            cli::query::query_index(query_type, target, project, format).await?;
        }

        Commands::Impact { file, project, format } => {
            cli::impact::analyze_impact(file, project, format).await?;
        }

        Commands::Coupling {
            file,
            project,
            limit,
            format,
        } => {
            cli::coupling::show_coupling(file, project, limit, format).await?;
        }

        Commands::Stats { project, format } => {
            cli::stats::show_stats(project, cli.verbose, format).await?;
        }

        Commands::Check { project, git, format } => {
            if cli::check::check_index(project, git, format).await? {
                std::process::exit(1);
            }
        }

        Commands::Serve { project, watch } => {
            info!("Starting MCP server for project: {}", project);
            cli::serve::serve_stdio(project, watch).await?;
        }

        Commands::Languages => {
            cli::languages::list_languages();
        }
    }

    Ok(())
}
