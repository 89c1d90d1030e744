// Library for tests to access modules

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod metrics;
pub mod models;
pub mod ports;
pub mod routes;
pub mod store;
pub mod summary;
pub mod summary_worker;
pub mod version;

/// Dispatcher as wired by the binary: SQLite data, SQLite outbox, settings from config.
pub type AppDispatcher =
    dispatcher::Dispatcher<store::SqliteStore, store::SqliteStore, config::MailConfig>;
