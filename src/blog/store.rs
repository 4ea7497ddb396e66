//! Author and entry operations over one connection

use rusqlite::params;
use rusqlite::types::Value;

use super::cursor::EntryCursor;
use super::model::{
    Author, BlogStats, Entry, EntryUpdate, EntryWithAuthor, NewAuthor, NewEntry, Order,
};
use crate::storage::{Database, Row, schema};
use crate::{Error, Result, timestamp};

pub(crate) const AUTHOR_COLUMNS: &str = "id, email, name, hashed_password";
pub(crate) const ENTRY_COLUMNS: &str =
    "id, author_id, slug, title, markdown, html, published, updated";

/// Typed access to the `authors` and `entries` tables.
///
/// Borrowing a [`Database`] keeps the store usable with both a plain
/// connection and a [`PooledConnection`](crate::PooledConnection).
#[derive(Debug, Clone, Copy)]
pub struct BlogStore<'db> {
    db: &'db Database,
}

impl<'db> BlogStore<'db> {
    pub fn new(db: &'db Database) -> Self {
        Self { db }
    }

    /// Create any missing schema objects, then wrap the connection
    pub fn open(db: &'db Database) -> Result<Self> {
        schema::create(db)?;
        Ok(Self::new(db))
    }

    pub fn database(&self) -> &'db Database {
        self.db
    }

    // ========== Author Operations ==========

    /// Insert an author, returning its new id.
    ///
    /// Fails with `ConstraintViolation` when the email is taken.
    pub fn create_author(&self, author: &NewAuthor) -> Result<i64> {
        author.validate()?;
        let id = self.db.insert(
            "INSERT INTO authors (email, name, hashed_password) VALUES (?1, ?2, ?3)",
            params![author.email, author.name, author.hashed_password],
        )?;
        tracing::debug!(author_id = id, email = %author.email, "created author");
        Ok(id)
    }

    pub fn get_author(&self, id: i64) -> Result<Option<Author>> {
        self.db
            .get(
                &format!("SELECT {AUTHOR_COLUMNS} FROM authors WHERE id = ?1"),
                [id],
            )?
            .map(|row| author_from_row(&row))
            .transpose()
    }

    pub fn find_author_by_email(&self, email: &str) -> Result<Option<Author>> {
        self.db
            .get(
                &format!("SELECT {AUTHOR_COLUMNS} FROM authors WHERE email = ?1"),
                [email],
            )?
            .map(|row| author_from_row(&row))
            .transpose()
    }

    pub fn list_authors(&self) -> Result<Vec<Author>> {
        self.db
            .query(&format!("SELECT {AUTHOR_COLUMNS} FROM authors ORDER BY id"), [])?
            .iter()
            .map(author_from_row)
            .collect()
    }

    /// Delete an author. Fails with `ReferentialIntegrityViolation` while any
    /// entry still references it.
    pub fn delete_author(&self, id: i64) -> Result<()> {
        let deleted = self.db.delete("DELETE FROM authors WHERE id = ?1", [id])?;
        if deleted == 0 {
            return Err(Error::NotFound(format!("author {id}")));
        }
        tracing::debug!(author_id = id, "deleted author");
        Ok(())
    }

    // ========== Entry Operations ==========

    /// Insert an entry, returning its new id. `published` defaults to now.
    pub fn create_entry(&self, entry: &NewEntry) -> Result<i64> {
        entry.validate()?;
        let id = match &entry.published {
            Some(published) => self.db.insert(
                "INSERT INTO entries (author_id, slug, title, markdown, html, published) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    entry.author_id,
                    entry.slug,
                    entry.title,
                    entry.markdown,
                    entry.html,
                    timestamp::format(published),
                ],
            )?,
            None => self.db.insert(
                "INSERT INTO entries (author_id, slug, title, markdown, html) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![entry.author_id, entry.slug, entry.title, entry.markdown, entry.html],
            )?,
        };
        tracing::debug!(entry_id = id, slug = %entry.slug, author_id = entry.author_id, "created entry");
        Ok(id)
    }

    pub fn get_entry(&self, id: i64) -> Result<Option<Entry>> {
        self.db
            .get(
                &format!("SELECT {ENTRY_COLUMNS} FROM entries WHERE id = ?1"),
                [id],
            )?
            .map(|row| entry_from_row(&row))
            .transpose()
    }

    pub fn find_entry_by_slug(&self, slug: &str) -> Result<Option<Entry>> {
        self.db
            .get(
                &format!("SELECT {ENTRY_COLUMNS} FROM entries WHERE slug = ?1"),
                [slug],
            )?
            .map(|row| entry_from_row(&row))
            .transpose()
    }

    /// Apply `update` to entry `id` and return the stored result.
    ///
    /// `updated` is refreshed even when `update` changes nothing.
    pub fn update_entry(&self, id: i64, update: &EntryUpdate) -> Result<Entry> {
        update.validate()?;

        let mut assignments = Vec::new();
        let mut values = Vec::new();
        if let Some(slug) = &update.slug {
            assignments.push("slug = ?");
            values.push(Value::Text(slug.clone()));
        }
        if let Some(title) = &update.title {
            assignments.push("title = ?");
            values.push(Value::Text(title.clone()));
        }
        if let Some(markdown) = &update.markdown {
            assignments.push("markdown = ?");
            values.push(Value::Text(markdown.clone()));
        }
        if let Some(html) = &update.html {
            assignments.push("html = ?");
            values.push(Value::Text(html.clone()));
        }
        if let Some(published) = &update.published {
            assignments.push("published = ?");
            values.push(Value::Text(timestamp::format(published)));
        }
        if assignments.is_empty() {
            // a no-op write still fires the touch trigger
            assignments.push("slug = slug");
        }
        values.push(Value::Integer(id));

        let sql = format!("UPDATE entries SET {} WHERE id = ?", assignments.join(", "));
        self.db.transaction(|tx| {
            let changed = tx.update(&sql, rusqlite::params_from_iter(values))?;
            if changed == 0 {
                return Err(Error::NotFound(format!("entry {id}")));
            }
            tracing::debug!(entry_id = id, "updated entry");
            BlogStore::new(tx)
                .get_entry(id)?
                .ok_or_else(|| Error::NotFound(format!("entry {id}")))
        })
    }

    pub fn delete_entry(&self, id: i64) -> Result<()> {
        let deleted = self.db.delete("DELETE FROM entries WHERE id = ?1", [id])?;
        if deleted == 0 {
            return Err(Error::NotFound(format!("entry {id}")));
        }
        tracing::debug!(entry_id = id, "deleted entry");
        Ok(())
    }

    /// Entries ordered by `published`, fetched lazily page by page
    pub fn list_entries(&self, order: Order) -> EntryCursor<'db> {
        EntryCursor::new(self.db, order)
    }

    /// All entries of one author with the author's name and email, newest first
    pub fn entries_by_author(&self, author_id: i64) -> Result<Vec<EntryWithAuthor>> {
        self.db
            .query(
                "SELECT entries.*, authors.name AS author_name, authors.email AS author_email \
                 FROM entries JOIN authors ON entries.author_id = authors.id \
                 WHERE entries.author_id = ?1 \
                 ORDER BY entries.published DESC, entries.id DESC",
                [author_id],
            )?
            .iter()
            .map(|row| {
                Ok(EntryWithAuthor {
                    entry: entry_from_row(row)?,
                    author_name: row.get("author_name")?,
                    author_email: row.get("author_email")?,
                })
            })
            .collect()
    }

    pub fn stats(&self) -> Result<BlogStats> {
        let authors: i64 = self.db.scalar("SELECT COUNT(*) FROM authors", [])?;
        let entries: i64 = self.db.scalar("SELECT COUNT(*) FROM entries", [])?;
        Ok(BlogStats {
            authors: authors as usize,
            entries: entries as usize,
        })
    }
}

pub(crate) fn author_from_row(row: &Row) -> Result<Author> {
    Ok(Author {
        id: row.get("id")?,
        email: row.get("email")?,
        name: row.get("name")?,
        hashed_password: row.get("hashed_password")?,
    })
}

pub(crate) fn entry_from_row(row: &Row) -> Result<Entry> {
    Ok(Entry {
        id: row.get("id")?,
        author_id: row.get("author_id")?,
        slug: row.get("slug")?,
        title: row.get("title")?,
        markdown: row.get("markdown")?,
        html: row.get("html")?,
        published: timestamp::parse(&row.get::<String>("published")?)?,
        updated: timestamp::parse(&row.get::<String>("updated")?)?,
    })
}
