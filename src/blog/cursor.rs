//! Lazy, restartable listing of entries by publication time
//!
//! The cursor pages through `entries` with a keyset on `(published, id)`, so
//! each page is an index range scan on `entries_published` and a saved
//! [`CursorPosition`] stays valid while rows are inserted or deleted.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};

use super::model::{Entry, Order};
use super::store::{ENTRY_COLUMNS, entry_from_row};
use crate::storage::Database;
use crate::{Result, timestamp};

pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Sort key of the last entry a cursor handed out
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorPosition {
    pub published: DateTime<Utc>,
    pub id: i64,
}

impl From<&Entry> for CursorPosition {
    fn from(entry: &Entry) -> Self {
        Self {
            published: entry.published,
            id: entry.id,
        }
    }
}

/// Iterator over entries ordered by `published`, ties broken by `id`.
///
/// Rows are fetched one page at a time as the iterator advances.
#[derive(Debug)]
pub struct EntryCursor<'db> {
    db: &'db Database,
    order: Order,
    page_size: usize,
    position: Option<CursorPosition>,
    buffer: VecDeque<Entry>,
    exhausted: bool,
}

impl<'db> EntryCursor<'db> {
    pub(crate) fn new(db: &'db Database, order: Order) -> Self {
        Self {
            db,
            order,
            page_size: DEFAULT_PAGE_SIZE,
            position: None,
            buffer: VecDeque::new(),
            exhausted: false,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Continue after a previously saved position
    pub fn resume(mut self, position: CursorPosition) -> Self {
        self.position = Some(position);
        self.buffer.clear();
        self.exhausted = false;
        self
    }

    /// Start over from the first entry
    pub fn rewind(&mut self) {
        self.position = None;
        self.buffer.clear();
        self.exhausted = false;
    }

    pub fn order(&self) -> Order {
        self.order
    }

    /// Key of the last entry yielded, `None` before the first
    pub fn position(&self) -> Option<&CursorPosition> {
        self.position.as_ref()
    }

    /// Fetch and return the next page, advancing past it
    pub fn next_page(&mut self) -> Result<Vec<Entry>> {
        if self.buffer.is_empty() {
            self.fill()?;
        }
        let page: Vec<Entry> = self.buffer.drain(..).collect();
        if let Some(last) = page.last() {
            self.position = Some(last.into());
        }
        Ok(page)
    }

    fn fill(&mut self) -> Result<()> {
        if self.exhausted {
            return Ok(());
        }

        let direction = self.order.as_sql();
        let (sql, params) = match &self.position {
            None => (
                format!(
                    "SELECT {ENTRY_COLUMNS} FROM entries \
                     ORDER BY published {direction}, id {direction} LIMIT ?1"
                ),
                vec![Value::Integer(self.page_size as i64)],
            ),
            Some(pos) => (
                format!(
                    "SELECT {ENTRY_COLUMNS} FROM entries \
                     WHERE (published, id) {op} (?1, ?2) \
                     ORDER BY published {direction}, id {direction} LIMIT ?3",
                    op = self.order.after_op(),
                ),
                vec![
                    Value::Text(timestamp::format(&pos.published)),
                    Value::Integer(pos.id),
                    Value::Integer(self.page_size as i64),
                ],
            ),
        };

        let db = self.db;
        let buffer = &mut self.buffer;
        let mut fetched = 0;
        db.for_each_row(&sql, rusqlite::params_from_iter(params), |row| {
            buffer.push_back(entry_from_row(&row)?);
            fetched += 1;
            Ok(())
        })?;
        if fetched < self.page_size {
            self.exhausted = true;
        }
        Ok(())
    }
}

impl Iterator for EntryCursor<'_> {
    type Item = Result<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() {
            if let Err(e) = self.fill() {
                // stop after reporting the failure
                self.exhausted = true;
                return Some(Err(e));
            }
        }
        let entry = self.buffer.pop_front()?;
        self.position = Some((&entry).into());
        Some(Ok(entry))
    }
}
