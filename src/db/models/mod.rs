pub mod book;
pub mod reading_session;
pub mod stats;

pub use book::{Book, BookFields, BookSummary, BookUpdate, NewBook};
pub use reading_session::ReadingSession;
pub use stats::{DayStat, StatsRange, TodayProgress};
