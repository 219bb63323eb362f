use anyhow::{bail, Context, Result};
use rusqlite::Connection;

/// Schema scripts in order; entry `n` upgrades `user_version` from `n` to `n + 1`.
const MIGRATIONS: &[(&str, &str)] = &[("schema_v1.sql", include_str!("schemas/schema_v1.sql"))];

fn schema_version(conn: &Connection) -> Result<usize> {
    let version: i64 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .context("failed to read user_version pragma")?;
    usize::try_from(version).with_context(|| format!("invalid user_version {version}"))
}

/// Brings the database up to the latest schema inside one transaction.
/// A database written by a newer build is refused rather than guessed at.
pub fn run_migrations(conn: &mut Connection) -> Result<()> {
    let current = schema_version(conn)?;
    let latest = MIGRATIONS.len();

    if current > latest {
        bail!("database schema v{current} is newer than this build supports (v{latest})");
    }

    let pending = &MIGRATIONS[current..];
    if pending.is_empty() {
        return Ok(());
    }

    let tx = conn
        .transaction()
        .context("failed to open migration transaction")?;

    for (name, sql) in pending {
        tx.execute_batch(sql)
            .with_context(|| format!("failed to execute {name}"))?;
    }

    tx.pragma_update(None, "user_version", latest as i64)
        .context("failed to update user_version pragma")?;
    tx.commit().context("failed to commit migrations")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrates_fresh_database_to_latest() {
        let mut conn = Connection::open_in_memory().expect("open");
        run_migrations(&mut conn).expect("migrate");

        assert_eq!(schema_version(&conn).expect("version"), MIGRATIONS.len());

        conn.execute(
            "INSERT INTO books (id, title, total_pages, created_at) VALUES ('b1', 'Dune', 412, '2024-01-01T00:00:00.000Z')",
            [],
        )
        .expect("insert");
        let (rating, notes, favorite): (i64, String, bool) = conn
            .query_row(
                "SELECT rating, notes, is_favorite FROM books WHERE id = 'b1'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .expect("row");
        assert_eq!((rating, notes.as_str(), favorite), (0, "", false));
    }

    #[test]
    fn rerun_is_a_no_op() {
        let mut conn = Connection::open_in_memory().expect("open");
        run_migrations(&mut conn).expect("migrate");
        run_migrations(&mut conn).expect("migrate twice");
        assert_eq!(schema_version(&conn).expect("version"), MIGRATIONS.len());
    }

    #[test]
    fn refuses_newer_schema() {
        let mut conn = Connection::open_in_memory().expect("open");
        conn.pragma_update(None, "user_version", MIGRATIONS.len() as i64 + 1)
            .expect("pragma");
        let err = run_migrations(&mut conn).unwrap_err();
        assert!(err.to_string().contains("newer than this build"));
    }
}
