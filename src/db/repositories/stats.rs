use std::collections::BTreeMap;

use anyhow::Result;
use chrono::{Days, NaiveDate};
use rusqlite::params;

use crate::db::{
    connection::Database,
    helpers::{format_datetime, parse_datetime, start_of_day},
    models::{DayStat, StatsRange, TodayProgress},
};

impl Database {
    /// One bucket per UTC day for the range ending at `today`, oldest first.
    /// Days without reading are present with zero pages.
    pub async fn daily_stats(&self, range: StatsRange, today: NaiveDate) -> Result<Vec<DayStat>> {
        let first_day = today - Days::new(range.days() as u64 - 1);
        let start = format_datetime(&start_of_day(first_day));
        let end = format_datetime(&start_of_day(today + Days::new(1)));

        let mut buckets: BTreeMap<NaiveDate, i64> = first_day
            .iter_days()
            .take(range.days() as usize)
            .map(|day| (day, 0))
            .collect();

        let rows = self
            .execute(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT date, pages_read FROM reading_sessions
                     WHERE date >= ?1 AND date < ?2",
                )?;
                let mut rows = stmt.query(params![start, end])?;
                let mut entries = Vec::new();
                while let Some(row) = rows.next()? {
                    let date: String = row.get(0)?;
                    let pages: i64 = row.get(1)?;
                    entries.push((parse_datetime(&date, "date")?, pages));
                }
                Ok(entries)
            })
            .await?;

        for (date, pages) in rows {
            if let Some(bucket) = buckets.get_mut(&date.date_naive()) {
                *bucket += pages.max(0);
            }
        }

        Ok(buckets
            .into_iter()
            .map(|(date, pages)| DayStat { date, pages })
            .collect())
    }

    pub async fn pages_on(&self, day: NaiveDate) -> Result<i64> {
        let start = format_datetime(&start_of_day(day));
        let end = format_datetime(&start_of_day(day + Days::new(1)));
        self.execute(move |conn| {
            let total: i64 = conn.query_row(
                "SELECT COALESCE(SUM(MAX(pages_read, 0)), 0) FROM reading_sessions
                 WHERE date >= ?1 AND date < ?2",
                params![start, end],
                |row| row.get(0),
            )?;
            Ok(total)
        })
        .await
    }

    pub async fn today_progress(&self, today: NaiveDate, goal: i64) -> Result<TodayProgress> {
        let pages = self.pages_on(today).await?;
        Ok(TodayProgress::new(pages, goal))
    }
}
