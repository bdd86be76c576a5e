pub mod accounts;
pub mod api;
pub mod directory;
pub mod error;
pub mod handlers;
pub mod models;
pub mod outbox;
pub mod returns;
pub mod schema;

use diesel_migrations::{embed_migrations, EmbeddedMigrations};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");
