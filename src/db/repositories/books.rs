use anyhow::{anyhow, bail, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::db::{
    connection::Database,
    helpers::{format_datetime, parse_datetime, parse_optional_datetime},
    models::{Book, BookFields, BookSummary, BookUpdate, NewBook},
};

const SUMMARY_SELECT: &str = "SELECT b.id AS id, b.title AS title, b.author AS author,
        b.total_pages AS total_pages, b.created_at AS created_at, b.rating AS rating,
        b.notes AS notes, b.is_favorite AS is_favorite,
        COALESCE(SUM(MAX(s.pages_read, 0)), 0) AS pages_read,
        MAX(s.date) AS last_activity
 FROM books b
 LEFT JOIN reading_sessions s ON s.book_id = b.id";

fn row_to_summary(row: &Row) -> Result<BookSummary> {
    let created_at: String = row.get("created_at")?;
    let last_activity: Option<String> = row.get("last_activity")?;

    let book = Book {
        id: row.get("id")?,
        title: row.get("title")?,
        author: row.get("author")?,
        total_pages: row.get("total_pages")?,
        created_at: parse_datetime(&created_at, "created_at")?,
        rating: row.get("rating")?,
        notes: row.get("notes")?,
        is_favorite: row.get("is_favorite")?,
    };

    Ok(BookSummary::new(
        book,
        row.get("pages_read")?,
        parse_optional_datetime(last_activity, "last_activity")?,
    ))
}

fn query_summaries(conn: &Connection, sql: &str, params: &[&dyn rusqlite::ToSql]) -> Result<Vec<BookSummary>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params)?;
    let mut books = Vec::new();
    while let Some(row) = rows.next()? {
        books.push(row_to_summary(row)?);
    }
    Ok(books)
}

fn fetch_summary(conn: &Connection, book_id: &str) -> Result<Option<BookSummary>> {
    let sql = format!("{SUMMARY_SELECT} WHERE b.id = ?1 GROUP BY b.id");
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params![book_id])?;
    match rows.next()? {
        Some(row) => Ok(Some(row_to_summary(row)?)),
        None => Ok(None),
    }
}

fn matches_search(summary: &BookSummary, needle: &str) -> bool {
    let needle = needle.to_lowercase();
    summary.book.title.to_lowercase().contains(&needle)
        || summary
            .book
            .author
            .as_deref()
            .is_some_and(|author| author.to_lowercase().contains(&needle))
}

impl Database {
    pub async fn create_book(&self, input: NewBook) -> Result<BookSummary> {
        let fields = BookFields::try_from(&input)?;
        self.execute(move |conn| {
            let id = Uuid::new_v4().to_string();
            let now = Utc::now();

            conn.execute(
                "INSERT INTO books (id, title, author, total_pages, created_at, rating, notes, is_favorite)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0)",
                params![
                    id,
                    fields.title,
                    fields.author,
                    fields.total_pages,
                    format_datetime(&now),
                    fields.rating,
                    fields.notes,
                ],
            )?;

            fetch_summary(conn, &id)?.ok_or_else(|| anyhow!("Book not found after insert"))
        })
        .await
    }

    pub async fn get_book(&self, book_id: &str) -> Result<Option<BookSummary>> {
        let book_id = book_id.to_string();
        self.execute(move |conn| fetch_summary(conn, &book_id)).await
    }

    /// Newest first. `search` matches title or author, case-insensitively.
    pub async fn list_books(&self, search: Option<String>) -> Result<Vec<BookSummary>> {
        self.execute(move |conn| {
            let sql = format!("{SUMMARY_SELECT} GROUP BY b.id ORDER BY b.created_at DESC");
            let books = query_summaries(conn, &sql, &[])?;

            let needle = search.as_deref().map(str::trim).unwrap_or_default();
            if needle.is_empty() {
                return Ok(books);
            }
            Ok(books
                .into_iter()
                .filter(|summary| matches_search(summary, needle))
                .collect())
        })
        .await
    }

    pub async fn update_book(&self, book_id: &str, update: BookUpdate) -> Result<BookSummary> {
        let fields = BookFields::try_from(&update)?;
        let book_id = book_id.to_string();
        self.execute(move |conn| {
            let rows_affected = conn.execute(
                "UPDATE books
                 SET title = ?1, author = ?2, total_pages = ?3, rating = ?4, notes = ?5
                 WHERE id = ?6",
                params![
                    fields.title,
                    fields.author,
                    fields.total_pages,
                    fields.rating,
                    fields.notes,
                    book_id,
                ],
            )?;

            if rows_affected == 0 {
                bail!("Book not found");
            }

            fetch_summary(conn, &book_id)?.ok_or_else(|| anyhow!("Book not found after update"))
        })
        .await
    }

    pub async fn set_favorite(&self, book_id: &str, is_favorite: bool) -> Result<BookSummary> {
        let book_id = book_id.to_string();
        self.execute(move |conn| {
            let rows_affected = conn.execute(
                "UPDATE books SET is_favorite = ?1 WHERE id = ?2",
                params![is_favorite, book_id],
            )?;

            if rows_affected == 0 {
                bail!("Book not found");
            }

            fetch_summary(conn, &book_id)?.ok_or_else(|| anyhow!("Book not found after update"))
        })
        .await
    }

    pub async fn list_favorites(&self) -> Result<Vec<BookSummary>> {
        self.execute(|conn| {
            let sql = format!(
                "{SUMMARY_SELECT} WHERE b.is_favorite = 1 GROUP BY b.id ORDER BY b.title COLLATE NOCASE ASC"
            );
            query_summaries(conn, &sql, &[])
        })
        .await
    }

    /// Deletes the book and, through the foreign key, all of its sessions.
    pub async fn delete_book(&self, book_id: &str) -> Result<()> {
        let book_id = book_id.to_string();
        self.execute(move |conn| {
            let rows_affected = conn.execute("DELETE FROM books WHERE id = ?1", params![book_id])?;
            if rows_affected == 0 {
                bail!("Book not found");
            }
            Ok(())
        })
        .await
    }

    pub(crate) async fn book_exists(&self, book_id: &str) -> Result<bool> {
        let book_id = book_id.to_string();
        self.execute(move |conn| {
            let found = conn
                .query_row("SELECT 1 FROM books WHERE id = ?1", params![book_id], |_| Ok(()))
                .optional()?;
            Ok(found.is_some())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use crate::db::{connection::test_support::open_temp, models::NewBook};

    fn new_book(title: &str, author: Option<&str>, total_pages: i64) -> NewBook {
        NewBook {
            title: title.into(),
            author: author.map(Into::into),
            total_pages,
            ..NewBook::default()
        }
    }

    #[tokio::test]
    async fn create_then_get_has_empty_progress() {
        let (_dir, db) = open_temp();
        let created = db
            .create_book(NewBook {
                rating: 7,
                ..new_book("  Dune ", Some("Frank Herbert"), 412)
            })
            .await
            .expect("create");

        assert_eq!(created.book.title, "Dune");
        assert_eq!(created.book.rating, 5);
        assert_eq!(created.pages_read, 0);
        assert_eq!(created.progress, 0.0);
        assert!(created.last_activity.is_none());

        let fetched = db.get_book(&created.book.id).await.expect("get").expect("exists");
        assert_eq!(fetched.book, created.book);
        assert!(db.get_book("missing").await.expect("get").is_none());
    }

    #[tokio::test]
    async fn derived_fields_follow_sessions() {
        let (_dir, db) = open_temp();
        let book = db.create_book(new_book("Emma", None, 100)).await.expect("create");
        let id = book.book.id.clone();

        let first = Utc::now() - Duration::days(2);
        let second = Utc::now() - Duration::days(1);
        db.log_reading(&id, 30, first).await.expect("log");
        db.log_reading(&id, 90, second).await.expect("log");

        let summary = db.get_book(&id).await.expect("get").expect("exists");
        assert_eq!(summary.pages_read, 120);
        assert_eq!(summary.progress, 1.0);
        let last = summary.last_activity.expect("activity");
        assert_eq!(last.timestamp_millis(), second.timestamp_millis());
    }

    #[tokio::test]
    async fn search_matches_title_or_author_ignoring_case() {
        let (_dir, db) = open_temp();
        db.create_book(new_book("Dune", Some("Frank Herbert"), 412)).await.expect("create");
        db.create_book(new_book("Emma", Some("Jane Austen"), 474)).await.expect("create");

        let by_title = db.list_books(Some("dU".into())).await.expect("list");
        assert_eq!(by_title.len(), 1);
        assert_eq!(by_title[0].book.title, "Dune");

        let by_author = db.list_books(Some("austen".into())).await.expect("list");
        assert_eq!(by_author.len(), 1);
        assert_eq!(by_author[0].book.title, "Emma");

        assert_eq!(db.list_books(Some("   ".into())).await.expect("list").len(), 2);
        assert_eq!(db.list_books(None).await.expect("list").len(), 2);
    }

    #[tokio::test]
    async fn update_and_favorites() {
        let (_dir, db) = open_temp();
        let zed = db.create_book(new_book("Zed", None, 10)).await.expect("create");
        let alpha = db.create_book(new_book("alpha", None, 10)).await.expect("create");
        db.create_book(new_book("Skipped", None, 10)).await.expect("create");

        let updated = db
            .update_book(
                &zed.book.id,
                crate::db::models::BookUpdate {
                    title: "Zed Again".into(),
                    author: Some("Someone".into()),
                    total_pages: 20,
                    rating: 4,
                    notes: "reread".into(),
                },
            )
            .await
            .expect("update");
        assert_eq!(updated.book.title, "Zed Again");
        assert_eq!(updated.book.notes, "reread");

        db.set_favorite(&zed.book.id, true).await.expect("fav");
        db.set_favorite(&alpha.book.id, true).await.expect("fav");

        let favorites = db.list_favorites().await.expect("favorites");
        let titles: Vec<_> = favorites.iter().map(|b| b.book.title.as_str()).collect();
        assert_eq!(titles, ["alpha", "Zed Again"]);

        db.set_favorite(&alpha.book.id, false).await.expect("unfav");
        assert_eq!(db.list_favorites().await.expect("favorites").len(), 1);

        assert!(db.set_favorite("missing", true).await.is_err());
    }

    #[tokio::test]
    async fn delete_cascades_to_sessions() {
        let (_dir, db) = open_temp();
        let book = db.create_book(new_book("Dune", None, 412)).await.expect("create");
        db.log_reading(&book.book.id, 12, Utc::now()).await.expect("log");

        db.delete_book(&book.book.id).await.expect("delete");

        assert!(db.get_book(&book.book.id).await.expect("get").is_none());
        let orphaned: i64 = db
            .execute(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM reading_sessions", [], |row| row.get(0))?)
            })
            .await
            .expect("count");
        assert_eq!(orphaned, 0);
        assert!(db.delete_book(&book.book.id).await.is_err());
    }
}
