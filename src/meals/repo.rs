use std::str::FromStr;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{PgPool, SqlitePool};

use super::error::RepoError;
use super::repo_types::MealRecord;

/// Record store for meals. `slug` uniqueness is enforced by the database.
#[async_trait]
pub trait MealRepo: Send + Sync {
    async fn insert(&self, meal: &MealRecord) -> Result<(), RepoError>;
    async fn list_all(&self) -> Result<Vec<MealRecord>, RepoError>;
    async fn get_by_slug(&self, slug: &str) -> Result<Option<MealRecord>, RepoError>;
    async fn migrate(&self) -> Result<(), RepoError>;
    async fn health_check(&self) -> Result<(), RepoError>;
}

#[derive(Clone)]
pub struct PgMealRepo {
    pool: PgPool,
}

impl PgMealRepo {
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, RepoError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl MealRepo for PgMealRepo {
    async fn insert(&self, meal: &MealRecord) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            INSERT INTO meals (slug, title, summary, instructions, image, creator, creator_email)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&meal.slug)
        .bind(&meal.title)
        .bind(&meal.summary)
        .bind(&meal.instructions)
        .bind(&meal.image)
        .bind(&meal.creator)
        .bind(&meal.creator_email)
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::from_insert(e, &meal.slug))?;
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<MealRecord>, RepoError> {
        let rows = sqlx::query_as::<_, MealRecord>(
            r#"
            SELECT slug, title, summary, instructions, image, creator, creator_email
            FROM meals
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<MealRecord>, RepoError> {
        let row = sqlx::query_as::<_, MealRecord>(
            r#"
            SELECT slug, title, summary, instructions, image, creator, creator_email
            FROM meals
            WHERE slug = $1
            "#,
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn migrate(&self) -> Result<(), RepoError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    async fn health_check(&self) -> Result<(), RepoError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Embedded store, used for local runs and tests.
#[derive(Clone)]
pub struct SqliteMealRepo {
    pool: SqlitePool,
}

impl SqliteMealRepo {
    pub async fn connect(url: &str) -> Result<Self, RepoError> {
        let opts = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        // One connection: writes are serialized and `sqlite::memory:` stays a
        // single database for the lifetime of the pool.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(opts)
            .await?;
        Ok(Self { pool })
    }

    #[cfg(test)]
    pub async fn in_memory() -> Result<Self, RepoError> {
        let repo = Self::connect("sqlite::memory:").await?;
        repo.migrate().await?;
        Ok(repo)
    }
}

#[async_trait]
impl MealRepo for SqliteMealRepo {
    async fn insert(&self, meal: &MealRecord) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            INSERT INTO meals (slug, title, summary, instructions, image, creator, creator_email)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&meal.slug)
        .bind(&meal.title)
        .bind(&meal.summary)
        .bind(&meal.instructions)
        .bind(&meal.image)
        .bind(&meal.creator)
        .bind(&meal.creator_email)
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::from_insert(e, &meal.slug))?;
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<MealRecord>, RepoError> {
        let rows = sqlx::query_as::<_, MealRecord>(
            r#"
            SELECT slug, title, summary, instructions, image, creator, creator_email
            FROM meals
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<MealRecord>, RepoError> {
        let row = sqlx::query_as::<_, MealRecord>(
            r#"
            SELECT slug, title, summary, instructions, image, creator, creator_email
            FROM meals
            WHERE slug = ?
            "#,
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn migrate(&self) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS meals (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                slug TEXT NOT NULL UNIQUE,
                title TEXT NOT NULL,
                summary TEXT NOT NULL,
                instructions TEXT NOT NULL,
                image TEXT NOT NULL,
                creator TEXT NOT NULL,
                creator_email TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn health_check(&self) -> Result<(), RepoError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
