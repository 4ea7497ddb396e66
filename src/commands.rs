use std::path::{Path, PathBuf};

use anyhow::Context as _;
use blogstore::blog::{BlogStats, CursorPosition};
use blogstore::config::{self, BlogstoreConfig};
use blogstore::storage::{Pool, schema};
use blogstore::ui::{self, Icons, theme};
use blogstore::{BlogStore, EntryUpdate, NewAuthor, NewEntry, Order, timestamp};
use owo_colors::OwoColorize;

use crate::{AuthorCommand, EntryCommand, OutputMode, emit_success};

/// Settings resolved from the config file and command-line overrides
pub struct Context {
    pub config_path: PathBuf,
    pub config: BlogstoreConfig,
    pub db_path: PathBuf,
    pub output_mode: OutputMode,
}

impl Context {
    pub fn resolve(
        config_path: Option<PathBuf>,
        database: Option<PathBuf>,
        output_mode: OutputMode,
    ) -> anyhow::Result<Self> {
        let config_path = config_path.unwrap_or_else(config::default_config_path);
        let config = config::load_config(Some(config_path.as_path()))
            .with_context(|| format!("reading {}", config_path.display()))?
            .unwrap_or_default();
        let base = config_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let db_path = database.unwrap_or_else(|| config.database_path(&base));

        Ok(Self {
            config_path,
            config,
            db_path,
            output_mode,
        })
    }

    fn open_pool(&self) -> anyhow::Result<Pool> {
        config::ensure_db_dir(&self.db_path)?;
        let pool = self
            .config
            .open_pool(&self.db_path)
            .with_context(|| format!("opening {}", self.db_path.display()))?;
        tracing::debug!("Using database {} ({} connections)", self.db_path.display(), pool.size());
        Ok(pool)
    }

    fn human(&self) -> bool {
        self.output_mode.is_human()
    }
}

pub fn run_init(ctx: &Context, force: bool) -> anyhow::Result<()> {
    if !ctx.config_path.exists() || force {
        let mut written = ctx.config.clone();
        if written.database.is_none() {
            written.database = Some(ctx.db_path.to_string_lossy().into_owned());
        }
        config::write_config(&ctx.config_path, &written, force)?;
    }

    let pool = ctx.open_pool()?;
    let db = pool.get()?;
    let store = BlogStore::open(&db)?;
    let tables = schema::table_names(&db)?;

    if ctx.human() {
        ui::header("Blogstore initialized");
        ui::status(Icons::FILE, "Config", &ctx.config_path.display().to_string());
        ui::status(Icons::DATABASE, "Database", &ctx.db_path.display().to_string());
        ui::status(Icons::GEAR, "Tables", &tables.join(", "));
        print_stats(&store.stats()?);
    } else {
        emit_success(
            ctx.output_mode,
            "init",
            serde_json::json!({
                "config": ctx.config_path,
                "database": ctx.db_path,
                "tables": tables,
            }),
        )?;
    }
    Ok(())
}

pub fn run_provision(ctx: &Context, yes: bool) -> anyhow::Result<()> {
    if !yes {
        anyhow::bail!(
            "provision drops all authors and entries in {}; re-run with --yes to confirm",
            ctx.db_path.display()
        );
    }

    let pool = ctx.open_pool()?;
    let db = pool.get()?;
    schema::provision(&db)?;

    if ctx.human() {
        ui::warn(&format!("Dropped and recreated all tables in {}", ctx.db_path.display()));
        ui::success("Schema provisioned");
    } else {
        emit_success(
            ctx.output_mode,
            "provision",
            serde_json::json!({ "database": ctx.db_path }),
        )?;
    }
    Ok(())
}

pub fn run_author(ctx: &Context, command: AuthorCommand) -> anyhow::Result<()> {
    let pool = ctx.open_pool()?;
    let db = pool.get()?;
    let store = BlogStore::open(&db)?;

    match command {
        AuthorCommand::Add {
            email,
            name,
            password_hash,
        } => {
            let id = store.create_author(&NewAuthor::new(&email, &name, password_hash))?;
            if ctx.human() {
                ui::record_created("author", &format!("#{id} {}", email.style(theme().key.clone())));
            } else {
                emit_success(ctx.output_mode, "author.add", serde_json::json!({ "id": id }))?;
            }
        }

        AuthorCommand::List => {
            let authors = store.list_authors()?;
            if ctx.human() {
                if authors.is_empty() {
                    println!("∅ No authors yet.");
                } else {
                    println!("{}", ui::authors_table(&authors));
                }
            } else {
                emit_success(ctx.output_mode, "author.list", serde_json::to_value(&authors)?)?;
            }
        }

        AuthorCommand::Show { email } => {
            let author = store
                .find_author_by_email(&email)?
                .with_context(|| format!("no author with email {email}"))?;
            if ctx.human() {
                ui::status(Icons::PERSON, "Author", &format!("#{} {}", author.id, author.name));
                ui::summary_row("email", &author.email);
                let entries = store.entries_by_author(author.id)?;
                ui::summary_row("entries", &entries.len().to_string());
                for item in entries {
                    ui::summary_row("  -", &format!("{} ({})", item.entry.title, item.entry.slug));
                }
            } else {
                emit_success(ctx.output_mode, "author.show", serde_json::to_value(&author)?)?;
            }
        }

        AuthorCommand::Delete { id } => {
            store
                .delete_author(id)
                .with_context(|| format!("deleting author {id}"))?;
            if ctx.human() {
                ui::record_deleted("author", &format!("#{id}"));
            } else {
                emit_success(ctx.output_mode, "author.delete", serde_json::json!({ "id": id }))?;
            }
        }
    }
    Ok(())
}

pub fn run_entry(ctx: &Context, command: EntryCommand) -> anyhow::Result<()> {
    let pool = ctx.open_pool()?;
    let db = pool.get()?;
    let store = BlogStore::open(&db)?;

    match command {
        EntryCommand::Add {
            author,
            slug,
            title,
            markdown,
            html,
            published,
        } => {
            let mut entry = NewEntry::new(author, &slug, title, read_body(&markdown)?, read_body(&html)?);
            if let Some(published) = published {
                entry = entry.with_published(timestamp::parse(&published)?);
            }
            let id = store.create_entry(&entry)?;
            if ctx.human() {
                ui::record_created("entry", &format!("#{id} {}", slug.style(theme().key.clone())));
            } else {
                emit_success(ctx.output_mode, "entry.add", serde_json::json!({ "id": id }))?;
            }
        }

        EntryCommand::Edit {
            id,
            slug,
            title,
            markdown,
            html,
            published,
        } => {
            let update = EntryUpdate {
                slug,
                title,
                markdown: markdown.as_deref().map(read_body).transpose()?,
                html: html.as_deref().map(read_body).transpose()?,
                published: published.as_deref().map(timestamp::parse).transpose()?,
            };
            let entry = store.update_entry(id, &update)?;
            if ctx.human() {
                ui::record_updated(
                    "entry",
                    &format!("#{} {} (updated {})", entry.id, entry.slug, timestamp::format(&entry.updated)),
                );
            } else {
                emit_success(ctx.output_mode, "entry.edit", serde_json::to_value(&entry)?)?;
            }
        }

        EntryCommand::Show { slug, body } => {
            let entry = store
                .find_entry_by_slug(&slug)?
                .with_context(|| format!("no entry with slug {slug}"))?;
            if ctx.human() {
                ui::section(&entry.title);
                ui::summary_row("id", &entry.id.to_string());
                ui::summary_row("slug", &entry.slug);
                ui::summary_row("author", &entry.author_id.to_string());
                ui::summary_row("published", &timestamp::format(&entry.published));
                ui::summary_row("updated", &timestamp::format(&entry.updated));
                if body {
                    println!();
                    println!("{}", entry.markdown);
                }
            } else {
                emit_success(ctx.output_mode, "entry.show", serde_json::to_value(&entry)?)?;
            }
        }

        EntryCommand::List {
            order,
            limit,
            after,
            author,
        } => {
            let order: Order = order.parse()?;
            let limit = limit.max(1);
            let mut cursor = store.list_entries(order).with_page_size(limit.clamp(1, 500));
            if let Some(after_id) = after {
                let anchor = store
                    .get_entry(after_id)?
                    .with_context(|| format!("no entry with id {after_id}"))?;
                cursor = cursor.resume(CursorPosition::from(&anchor));
            }

            let mut entries = Vec::with_capacity(limit);
            for entry in cursor {
                let entry = entry?;
                if author.is_some_and(|a| a != entry.author_id) {
                    continue;
                }
                entries.push(entry);
                if entries.len() == limit {
                    break;
                }
            }

            if ctx.human() {
                if entries.is_empty() {
                    println!("∅ No entries found.");
                } else {
                    println!("{}", ui::entries_table(&entries));
                    if entries.len() == limit {
                        if let Some(last) = entries.last() {
                            println!("{}", ui::dim(&format!("more: --after {}", last.id)));
                        }
                    }
                }
            } else {
                emit_success(ctx.output_mode, "entry.list", serde_json::to_value(&entries)?)?;
            }
        }

        EntryCommand::Delete { id } => {
            store.delete_entry(id)?;
            if ctx.human() {
                ui::record_deleted("entry", &format!("#{id}"));
            } else {
                emit_success(ctx.output_mode, "entry.delete", serde_json::json!({ "id": id }))?;
            }
        }
    }
    Ok(())
}

pub fn run_stats(ctx: &Context) -> anyhow::Result<()> {
    let pool = ctx.open_pool()?;
    let db = pool.get()?;
    let stats = BlogStore::open(&db)?.stats()?;

    if ctx.human() {
        println!("{} Blogstore Statistics ({})", Icons::STATS, ctx.db_path.display());
        print_stats(&stats);
        ui::status(Icons::DATABASE, "Pool", &format!("{} connections", pool.size()));
    } else {
        emit_success(
            ctx.output_mode,
            "stats",
            serde_json::json!({
                "authors": stats.authors,
                "entries": stats.entries,
                "pool_size": pool.size(),
            }),
        )?;
    }
    Ok(())
}

pub fn run_version(output_mode: OutputMode) -> anyhow::Result<()> {
    if output_mode.is_human() {
        println!(
            "{} {}",
            "Blogstore".bold().style(theme().info.clone()),
            format!("Version {}", env!("CARGO_PKG_VERSION")).bold()
        );
    } else {
        emit_success(
            output_mode,
            "version",
            serde_json::json!({ "version": env!("CARGO_PKG_VERSION") }),
        )?;
    }
    Ok(())
}

fn print_stats(stats: &BlogStats) {
    println!(
        "{}",
        ui::stats_table(&[
            ("Authors", &stats.authors.to_string()),
            ("Entries", &stats.entries.to_string()),
        ])
    );
}

fn read_body(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}
