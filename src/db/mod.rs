mod connection;
mod migrations;

pub mod helpers;
pub mod models;
mod repositories;

pub use connection::Database;
pub use models::{
    Book, BookSummary, BookUpdate, DayStat, NewBook, ReadingSession, StatsRange, TodayProgress,
};
