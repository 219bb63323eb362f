use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Row};
use uuid::Uuid;

use crate::db::{
    connection::Database,
    helpers::{format_datetime, parse_datetime},
    models::ReadingSession,
};

fn row_to_session(row: &Row) -> Result<ReadingSession> {
    let date: String = row.get("date")?;
    Ok(ReadingSession {
        id: row.get("id")?,
        book_id: row.get("book_id")?,
        date: parse_datetime(&date, "date")?,
        pages_read: row.get("pages_read")?,
    })
}

impl Database {
    /// Records pages read for a book. Zero or negative page counts are rejected.
    pub async fn log_reading(
        &self,
        book_id: &str,
        pages_read: i64,
        date: DateTime<Utc>,
    ) -> Result<ReadingSession> {
        if pages_read <= 0 {
            bail!("pages read must be greater than zero");
        }
        if !self.book_exists(book_id).await? {
            bail!("Book not found");
        }

        let session = ReadingSession {
            id: Uuid::new_v4().to_string(),
            book_id: book_id.to_string(),
            date,
            pages_read,
        };
        let record = session.clone();

        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO reading_sessions (id, book_id, date, pages_read)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    record.id,
                    record.book_id,
                    format_datetime(&record.date),
                    record.pages_read,
                ],
            )?;
            Ok(())
        })
        .await?;

        Ok(session)
    }

    /// Newest first.
    pub async fn list_sessions_for_book(&self, book_id: &str) -> Result<Vec<ReadingSession>> {
        let book_id = book_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, book_id, date, pages_read
                 FROM reading_sessions
                 WHERE book_id = ?1
                 ORDER BY date DESC",
            )?;

            let mut rows = stmt.query(params![book_id])?;
            let mut sessions = Vec::new();
            while let Some(row) = rows.next()? {
                sessions.push(row_to_session(row)?);
            }

            Ok(sessions)
        })
        .await
    }

    pub async fn delete_reading_session(&self, session_id: &str) -> Result<()> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let rows_affected = conn.execute(
                "DELETE FROM reading_sessions WHERE id = ?1",
                params![session_id],
            )?;
            if rows_affected == 0 {
                bail!("Reading session not found");
            }
            Ok(())
        })
        .await
    }
}
