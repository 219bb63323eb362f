//! Aggregates behind the stats screen and the daily goal ring.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum StatsRange {
    Week,
    Month,
}

impl StatsRange {
    pub fn days(&self) -> i64 {
        match self {
            StatsRange::Week => 7,
            StatsRange::Month => 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DayStat {
    pub date: NaiveDate,
    pub pages: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TodayProgress {
    pub pages: i64,
    pub goal: i64,
    /// `pages / goal` clamped to 1.0; 0.0 when no goal is set.
    pub progress: f64,
}

impl TodayProgress {
    pub fn new(pages: i64, goal: i64) -> Self {
        let progress = if goal <= 0 {
            0.0
        } else {
            (pages.max(0) as f64 / goal as f64).min(1.0)
        };
        Self {
            pages,
            goal,
            progress,
        }
    }
}
