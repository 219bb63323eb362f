mod books;
mod reading_sessions;
mod stats;
