//! Author and entry records
//!
//! Write inputs (`NewAuthor`, `NewEntry`, `EntryUpdate`) are validated against
//! the declared column limits before they reach the engine, so callers get a
//! `ValidationViolation` naming the field instead of a raw CHECK failure.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::str::FromStr;

use crate::storage::schema::MEDIUM_TEXT_MAX_BYTES;
use crate::{Error, Result, timestamp};

pub const EMAIL_MAX_CHARS: usize = 100;
pub const NAME_MAX_CHARS: usize = 100;
pub const HASHED_PASSWORD_MAX_CHARS: usize = 100;
pub const SLUG_MAX_CHARS: usize = 100;
pub const TITLE_MAX_CHARS: usize = 512;

/// A person who can write entries
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Author {
    pub id: i64,
    pub email: String,
    pub name: String,
    /// Output of a one-way password hash; never serialized
    #[serde(skip_serializing)]
    pub hashed_password: String,
}

/// Input for creating an author
#[derive(Debug, Clone)]
pub struct NewAuthor {
    pub email: String,
    pub name: String,
    pub hashed_password: String,
}

impl NewAuthor {
    pub fn new(
        email: impl Into<String>,
        name: impl Into<String>,
        hashed_password: impl Into<String>,
    ) -> Self {
        Self {
            email: email.into(),
            name: name.into(),
            hashed_password: hashed_password.into(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        check_chars("email", &self.email, EMAIL_MAX_CHARS)?;
        check_chars("name", &self.name, NAME_MAX_CHARS)?;
        check_chars("hashed_password", &self.hashed_password, HASHED_PASSWORD_MAX_CHARS)
    }
}

/// One blog post.
///
/// `html` is the rendered form of `markdown`, cached for fast reads. The
/// store never renders; whoever changes `markdown` supplies the new `html`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
    pub id: i64,
    pub author_id: i64,
    pub slug: String,
    pub title: String,
    pub markdown: String,
    pub html: String,
    /// When the post went live; may be backdated
    pub published: DateTime<Utc>,
    /// Last modification, maintained by the engine
    pub updated: DateTime<Utc>,
}

/// Input for creating an entry
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub author_id: i64,
    pub slug: String,
    pub title: String,
    pub markdown: String,
    pub html: String,
    /// Defaults to the creation time when `None`
    pub published: Option<DateTime<Utc>>,
}

impl NewEntry {
    pub fn new(
        author_id: i64,
        slug: impl Into<String>,
        title: impl Into<String>,
        markdown: impl Into<String>,
        html: impl Into<String>,
    ) -> Self {
        Self {
            author_id,
            slug: slug.into(),
            title: title.into(),
            markdown: markdown.into(),
            html: html.into(),
            published: None,
        }
    }

    /// Set an explicit publication time
    pub fn with_published(mut self, published: DateTime<Utc>) -> Self {
        self.published = Some(published);
        self
    }

    pub fn validate(&self) -> Result<()> {
        check_chars("slug", &self.slug, SLUG_MAX_CHARS)?;
        check_chars("title", &self.title, TITLE_MAX_CHARS)?;
        check_text("markdown", &self.markdown)?;
        check_text("html", &self.html)?;
        check_published(self.published.as_ref())
    }
}

/// Changes to apply to an existing entry; `None` leaves a field alone.
#[derive(Debug, Clone, Default)]
pub struct EntryUpdate {
    pub slug: Option<String>,
    pub title: Option<String>,
    pub markdown: Option<String>,
    pub html: Option<String>,
    pub published: Option<DateTime<Utc>>,
}

impl EntryUpdate {
    pub fn slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = Some(slug.into());
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Replace the body; `html` must be the rendering of `markdown`
    pub fn content(mut self, markdown: impl Into<String>, html: impl Into<String>) -> Self {
        self.markdown = Some(markdown.into());
        self.html = Some(html.into());
        self
    }

    pub fn published(mut self, published: DateTime<Utc>) -> Self {
        self.published = Some(published);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.slug.is_none()
            && self.title.is_none()
            && self.markdown.is_none()
            && self.html.is_none()
            && self.published.is_none()
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(slug) = &self.slug {
            check_chars("slug", slug, SLUG_MAX_CHARS)?;
        }
        if let Some(title) = &self.title {
            check_chars("title", title, TITLE_MAX_CHARS)?;
        }
        if let Some(markdown) = &self.markdown {
            check_text("markdown", markdown)?;
            if self.html.is_none() {
                return Err(Error::validation(
                    "html",
                    "markdown changed without a regenerated html rendering",
                ));
            }
        }
        if let Some(html) = &self.html {
            check_text("html", html)?;
        }
        check_published(self.published.as_ref())
    }
}

/// An entry joined with its author's public fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryWithAuthor {
    #[serde(flatten)]
    pub entry: Entry,
    pub author_name: String,
    pub author_email: String,
}

/// Direction for listing entries by `published`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Order {
    Ascending,
    /// Newest first
    #[default]
    Descending,
}

impl Order {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Order::Ascending => "ASC",
            Order::Descending => "DESC",
        }
    }

    /// Keyset comparison operator selecting rows after the cursor
    pub(crate) fn after_op(&self) -> &'static str {
        match self {
            Order::Ascending => ">",
            Order::Descending => "<",
        }
    }
}

impl FromStr for Order {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "asc" | "ascending" | "oldest" => Ok(Order::Ascending),
            "desc" | "descending" | "newest" => Ok(Order::Descending),
            _ => Err(Error::validation("order", format!("unknown order: {s}"))),
        }
    }
}

/// Row counts per table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BlogStats {
    pub authors: usize,
    pub entries: usize,
}

impl std::fmt::Display for BlogStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Blog Statistics:")?;
        writeln!(f, "  Authors: {}", self.authors)?;
        writeln!(f, "  Entries: {}", self.entries)
    }
}

/// Required, at most `max` characters (UTF-8 scalar values, as the engine counts)
fn check_chars(field: &str, value: &str, max: usize) -> Result<()> {
    if value.is_empty() {
        return Err(Error::validation(field, "required"));
    }
    let len = value.chars().count();
    if len > max {
        return Err(Error::validation(
            field,
            format!("{len} characters exceeds limit of {max}"),
        ));
    }
    Ok(())
}

fn check_text(field: &str, value: &str) -> Result<()> {
    if value.len() > MEDIUM_TEXT_MAX_BYTES {
        return Err(Error::validation(
            field,
            format!("{} bytes exceeds limit of {MEDIUM_TEXT_MAX_BYTES}", value.len()),
        ));
    }
    Ok(())
}

fn check_published(published: Option<&DateTime<Utc>>) -> Result<()> {
    match published {
        Some(ts) if !timestamp::in_range(ts) => Err(Error::validation(
            "published",
            format!(
                "{ts} is outside years {}..={}",
                timestamp::MIN_YEAR,
                timestamp::MAX_YEAR
            ),
        )),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_of(err: Error) -> String {
        match err {
            Error::ValidationViolation { field, .. } => field,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_author_limits() {
        assert!(NewAuthor::new("a@x.com", "A", "h1").validate().is_ok());

        let long = "e".repeat(EMAIL_MAX_CHARS + 1);
        assert_eq!(field_of(NewAuthor::new(long, "A", "h1").validate().unwrap_err()), "email");
        assert_eq!(field_of(NewAuthor::new("a@x.com", "", "h1").validate().unwrap_err()), "name");
    }

    #[test]
    fn test_limits_count_characters_not_bytes() {
        // 100 two-byte characters fit a 100 character column
        let name = "é".repeat(NAME_MAX_CHARS);
        assert!(NewAuthor::new("a@x.com", name, "h1").validate().is_ok());
    }

    #[test]
    fn test_entry_title_limit() {
        let entry = NewEntry::new(1, "hello", "t".repeat(TITLE_MAX_CHARS), "# hi", "<h1>hi</h1>");
        assert!(entry.validate().is_ok());

        let entry = NewEntry::new(1, "hello", "t".repeat(TITLE_MAX_CHARS + 1), "# hi", "<h1>hi</h1>");
        assert_eq!(field_of(entry.validate().unwrap_err()), "title");
    }

    #[test]
    fn test_update_requires_html_with_markdown() {
        let update = EntryUpdate {
            markdown: Some("# new".into()),
            ..Default::default()
        };
        assert_eq!(field_of(update.validate().unwrap_err()), "html");

        let update = EntryUpdate::default().content("# new", "<h1>new</h1>");
        assert!(update.validate().is_ok());
        assert!(EntryUpdate::default().is_empty());
    }

    #[test]
    fn test_published_year_range() {
        use chrono::TimeZone;

        let far = Utc.with_ymd_and_hms(10000, 1, 1, 0, 0, 0).unwrap();
        let ancient = Utc.with_ymd_and_hms(999, 12, 31, 23, 59, 59).unwrap();
        let entry = NewEntry::new(1, "far", "Far", "", "");
        assert_eq!(field_of(entry.clone().with_published(far).validate().unwrap_err()), "published");
        assert_eq!(field_of(entry.clone().with_published(ancient).validate().unwrap_err()), "published");
        assert!(
            entry
                .with_published(Utc.with_ymd_and_hms(9999, 12, 31, 23, 59, 59).unwrap())
                .validate()
                .is_ok()
        );

        assert_eq!(field_of(EntryUpdate::default().published(far).validate().unwrap_err()), "published");
    }

    #[test]
    fn test_order_parsing() {
        assert_eq!("desc".parse::<Order>().unwrap(), Order::Descending);
        assert_eq!("ASC".parse::<Order>().unwrap(), Order::Ascending);
        assert!("sideways".parse::<Order>().is_err());
        assert_eq!(Order::default(), Order::Descending);
    }

    #[test]
    fn test_author_json_hides_password() {
        let author = Author {
            id: 1,
            email: "a@x.com".into(),
            name: "A".into(),
            hashed_password: "h1".into(),
        };
        let json = serde_json::to_value(&author).unwrap();
        assert!(json.get("hashed_password").is_none());
        assert_eq!(json["email"], "a@x.com");
    }
}
