//! Repository layer for database operations

pub mod books;

use sqlx::{postgres::PgPoolOptions, Pool, Postgres};

use crate::{
    config::{DatabaseConfig, RunMode},
    error::AppResult,
};

/// Main repository struct holding database connection pool
#[derive(Clone)]
pub struct Repository {
    pub pool: Pool<Postgres>,
    pub books: books::BooksRepository,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            books: books::BooksRepository::new(pool.clone()),
            pool,
        }
    }

    /// Connect to the database selected by the run mode
    pub async fn connect(config: &DatabaseConfig, mode: RunMode) -> AppResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect(&config.connection_url(mode))
            .await?;
        Ok(Self::new(pool))
    }

    /// Apply pending migrations
    pub async fn migrate(&self) -> AppResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Round-trip to the database
    pub async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
