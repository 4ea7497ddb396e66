use tabled::{Table, Tabled, settings::Style};

use crate::blog::{Author, Entry};

#[derive(Tabled)]
pub struct TableRow {
    #[tabled(rename = "Metric")]
    pub metric: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

#[derive(Tabled)]
struct AuthorRow {
    #[tabled(rename = "ID")]
    id: i64,
    #[tabled(rename = "Email")]
    email: String,
    #[tabled(rename = "Name")]
    name: String,
}

#[derive(Tabled)]
struct EntryRow {
    #[tabled(rename = "ID")]
    id: i64,
    #[tabled(rename = "Slug")]
    slug: String,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "Author")]
    author_id: i64,
    #[tabled(rename = "Published")]
    published: String,
    #[tabled(rename = "Updated")]
    updated: String,
}

const TITLE_WIDTH: usize = 48;

pub struct TableBuilder {
    rows: Vec<TableRow>,
}

impl TableBuilder {
    pub fn new() -> Self {
        Self { rows: Vec::new() }
    }

    pub fn add_row(&mut self, label: &str, value: &str) {
        self.rows.push(TableRow {
            metric: label.to_string(),
            value: value.to_string(),
        });
    }

    pub fn build(&self) -> String {
        if self.rows.is_empty() {
            return String::new();
        }

        Table::new(&self.rows).with(Style::rounded()).to_string()
    }
}

impl Default for TableBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub fn stats_table(stats: &[(&str, &str)]) -> String {
    let mut builder = TableBuilder::new();
    for (label, value) in stats {
        builder.add_row(label, value);
    }
    builder.build()
}

pub fn authors_table(authors: &[Author]) -> String {
    let rows = authors.iter().map(|a| AuthorRow {
        id: a.id,
        email: a.email.clone(),
        name: a.name.clone(),
    });
    Table::new(rows).with(Style::rounded()).to_string()
}

pub fn entries_table(entries: &[Entry]) -> String {
    let rows = entries.iter().map(|e| EntryRow {
        id: e.id,
        slug: e.slug.clone(),
        title: shorten(&e.title, TITLE_WIDTH),
        author_id: e.author_id,
        published: e.published.format("%Y-%m-%d %H:%M").to_string(),
        updated: e.updated.format("%Y-%m-%d %H:%M").to_string(),
    });
    Table::new(rows).with(Style::rounded()).to_string()
}

fn shorten(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(width.saturating_sub(1)).collect();
    cut.push('…');
    cut
}
