//! Book records and the progress figures derived from their sessions.

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const MAX_RATING: i64 = 5;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: String,
    pub title: String,
    pub author: Option<String>,
    pub total_pages: i64,
    pub created_at: DateTime<Utc>,
    /// 0 means unrated.
    pub rating: i64,
    pub notes: String,
    pub is_favorite: bool,
}

/// Input for creating a book.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBook {
    pub title: String,
    pub author: Option<String>,
    pub total_pages: i64,
    #[serde(default)]
    pub rating: i64,
    #[serde(default)]
    pub notes: String,
}

/// Full replacement of the editable fields of a book.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookUpdate {
    pub title: String,
    pub author: Option<String>,
    pub total_pages: i64,
    pub rating: i64,
    pub notes: String,
}

/// Validated, trimmed and clamped book fields ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct BookFields {
    pub title: String,
    pub author: Option<String>,
    pub total_pages: i64,
    pub rating: i64,
    pub notes: String,
}

impl BookFields {
    pub fn normalize(
        title: &str,
        author: Option<&str>,
        total_pages: i64,
        rating: i64,
        notes: &str,
    ) -> Result<Self> {
        let title = title.trim();
        if title.is_empty() {
            bail!("book title must not be empty");
        }

        let author = author
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_owned);

        Ok(Self {
            title: title.to_owned(),
            author,
            total_pages: total_pages.max(0),
            rating: rating.clamp(0, MAX_RATING),
            notes: notes.to_owned(),
        })
    }
}

impl TryFrom<&NewBook> for BookFields {
    type Error = anyhow::Error;

    fn try_from(input: &NewBook) -> Result<Self> {
        BookFields::normalize(
            &input.title,
            input.author.as_deref(),
            input.total_pages,
            input.rating,
            &input.notes,
        )
    }
}

impl TryFrom<&BookUpdate> for BookFields {
    type Error = anyhow::Error;

    fn try_from(input: &BookUpdate) -> Result<Self> {
        BookFields::normalize(
            &input.title,
            input.author.as_deref(),
            input.total_pages,
            input.rating,
            &input.notes,
        )
    }
}

/// A book together with the aggregates computed from its reading sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookSummary {
    #[serde(flatten)]
    pub book: Book,
    pub pages_read: i64,
    /// Fraction of `total_pages` read, clamped to `0.0..=1.0`.
    pub progress: f64,
    pub last_activity: Option<DateTime<Utc>>,
}

impl BookSummary {
    pub fn new(book: Book, pages_read: i64, last_activity: Option<DateTime<Utc>>) -> Self {
        let pages_read = pages_read.max(0);
        let progress = progress(pages_read, book.total_pages);
        Self {
            book,
            pages_read,
            progress,
            last_activity,
        }
    }
}

pub fn progress(pages_read: i64, total_pages: i64) -> f64 {
    if total_pages <= 0 {
        return 0.0;
    }
    (pages_read.max(0) as f64 / total_pages as f64).min(1.0)
}
