//! Blogstore CLI - manage the authors/entries database from the shell

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod commands;

#[derive(Parser)]
#[command(name = "blogstore")]
#[command(version)]
#[command(about = "Blog storage - authors and entries on an embedded SQLite database")]
#[command(long_about = r#"
Blogstore keeps a blog's authors and entries in a single SQLite file:
  • Unique author emails and entry slugs
  • Entries always reference an existing author
  • `updated` maintained by the database on every edit

Example usage:
  blogstore init
  blogstore author add --email a@x.com --name A --password-hash '$argon2id$...'
  blogstore entry add --author 1 --slug hello --title Hello --markdown hello.md --html hello.html
  blogstore entry list --order desc --limit 10
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress status lines (also BLOGSTORE_QUIET=1)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Emit machine-readable JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    /// Path to the config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Path to the database file (overrides the config file)
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a config file and create the schema if it is missing
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// Drop and recreate both tables. Destroys all data.
    Provision {
        /// Confirm the destructive re-provisioning
        #[arg(long)]
        yes: bool,
    },

    /// Manage authors
    Author {
        #[command(subcommand)]
        command: AuthorCommand,
    },

    /// Manage entries
    Entry {
        #[command(subcommand)]
        command: EntryCommand,
    },

    /// Show row counts
    Stats,

    /// Show version information
    Version,
}

#[derive(Subcommand)]
pub enum AuthorCommand {
    /// Register an author
    Add {
        #[arg(long)]
        email: String,

        #[arg(long)]
        name: String,

        /// Output of a one-way password hash (never the plaintext)
        #[arg(long)]
        password_hash: String,
    },

    /// List all authors
    List,

    /// Show one author by email
    Show { email: String },

    /// Delete an author that has no entries
    Delete { id: i64 },
}

#[derive(Subcommand)]
pub enum EntryCommand {
    /// Create an entry from a markdown source and its rendered html
    Add {
        /// Author id
        #[arg(long)]
        author: i64,

        #[arg(long)]
        slug: String,

        #[arg(long)]
        title: String,

        /// Markdown source file
        #[arg(long)]
        markdown: PathBuf,

        /// Rendered html file
        #[arg(long)]
        html: PathBuf,

        /// Publication time (RFC 3339); defaults to now
        #[arg(long)]
        published: Option<String>,
    },

    /// Change fields of an entry
    Edit {
        id: i64,

        #[arg(long)]
        slug: Option<String>,

        #[arg(long)]
        title: Option<String>,

        /// New markdown source file; requires --html
        #[arg(long, requires = "html")]
        markdown: Option<PathBuf>,

        /// New rendered html file
        #[arg(long)]
        html: Option<PathBuf>,

        /// New publication time (RFC 3339)
        #[arg(long)]
        published: Option<String>,
    },

    /// Show one entry by slug
    Show {
        slug: String,

        /// Print the markdown body as well
        #[arg(long)]
        body: bool,
    },

    /// List entries by publication time
    List {
        /// asc or desc
        #[arg(long, default_value = "desc")]
        order: String,

        /// Maximum number of entries
        #[arg(long, default_value = "20")]
        limit: usize,

        /// Continue after this entry id (as printed by a previous page)
        #[arg(long)]
        after: Option<i64>,

        /// Only entries of this author
        #[arg(long)]
        author: Option<i64>,
    },

    /// Delete an entry
    Delete { id: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

impl OutputMode {
    pub fn is_human(self) -> bool {
        self == OutputMode::Human
    }
}

pub fn emit_success(output_mode: OutputMode, command: &str, data: serde_json::Value) -> anyhow::Result<()> {
    if output_mode.is_human() {
        return Ok(());
    }
    let envelope = serde_json::json!({
        "ok": true,
        "command": command,
        "data": data,
    });
    println!("{}", serde_json::to_string_pretty(&envelope)?);
    Ok(())
}

fn emit_failure(output_mode: OutputMode, err: &anyhow::Error) {
    if output_mode.is_human() {
        blogstore::ui::error(&format!("{err:#}"));
    } else {
        let envelope = serde_json::json!({
            "ok": false,
            "error": format!("{err:#}"),
        });
        println!("{envelope}");
    }
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    blogstore::output::init_quiet(cli.quiet);
    let output_mode = if cli.json { OutputMode::Json } else { OutputMode::Human };

    if let Err(err) = run(cli, output_mode) {
        emit_failure(output_mode, &err);
        std::process::exit(1);
    }
}

fn run(cli: Cli, output_mode: OutputMode) -> anyhow::Result<()> {
    let ctx = commands::Context::resolve(cli.config, cli.database, output_mode)?;

    match cli.command {
        Commands::Init { force } => commands::run_init(&ctx, force),
        Commands::Provision { yes } => commands::run_provision(&ctx, yes),
        Commands::Author { command } => commands::run_author(&ctx, command),
        Commands::Entry { command } => commands::run_entry(&ctx, command),
        Commands::Stats => commands::run_stats(&ctx),
        Commands::Version => commands::run_version(output_mode),
    }
}
