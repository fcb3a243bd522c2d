use std::str::FromStr;
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use shared::{Address, CreateAddressRequest, CreatePostRequest, CreateUserRequest, Post, User};
use sqlx::sqlite::{SqliteConnectOptions, SqliteRow};
use sqlx::{Row, SqlitePool};

/// DbConnection manages all storage access for users, addresses and posts.
///
/// Relationships are declared in the schema itself: `addresses.user_id` is
/// unique (one address per user) and both child tables cascade on user
/// deletion. Timestamps are assigned here, never taken from clients.
#[derive(Clone)]
pub struct DbConnection {
    pool: Arc<SqlitePool>,
}

impl DbConnection {
    /// Open (creating if missing) the database at `url` and declare the schema.
    pub async fn new(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            // Cascade rules are no-ops unless foreign keys are enforced
            .foreign_keys(true);

        let pool = SqlitePool::connect_with(options).await?;

        Self::setup_schema(&pool).await?;

        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    /// Initialize a test database with a unique in-memory name
    #[cfg(test)]
    pub async fn init_test() -> Result<Self> {
        let test_id = uuid::Uuid::new_v4().to_string();
        let db_url = format!("file:memdb_{}?mode=memory&cache=shared", test_id);

        Self::new(&db_url).await
    }

    /// Set up the required database schema
    async fn setup_schema(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                first_name TEXT NOT NULL,
                last_name TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS addresses (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                street TEXT NOT NULL,
                city TEXT NOT NULL,
                state TEXT NOT NULL,
                zip_code TEXT NOT NULL,
                user_id INTEGER NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS posts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                body TEXT NOT NULL,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Get the underlying SQLite pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // --- users ---

    pub async fn count_users(&self) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&*self.pool)
            .await
    }

    /// Fetch one page of users, newest first, each left-joined with its
    /// address. The id tiebreak keeps same-timestamp rows in insertion order.
    pub async fn list_users(&self, limit: i64, offset: i64) -> Result<Vec<User>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT u.id, u.first_name, u.last_name, u.email, u.created_at, u.updated_at,
                   a.id AS address_id, a.street, a.city, a.state, a.zip_code,
                   a.user_id AS address_user_id,
                   a.created_at AS address_created_at, a.updated_at AS address_updated_at
            FROM users u
            LEFT JOIN addresses a ON a.user_id = u.id
            ORDER BY u.created_at DESC, u.id DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&*self.pool)
        .await?;

        Ok(rows.iter().map(user_from_row).collect())
    }

    pub async fn get_user(&self, id: i64) -> Result<Option<User>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT u.id, u.first_name, u.last_name, u.email, u.created_at, u.updated_at,
                   a.id AS address_id, a.street, a.city, a.state, a.zip_code,
                   a.user_id AS address_user_id,
                   a.created_at AS address_created_at, a.updated_at AS address_updated_at
            FROM users u
            LEFT JOIN addresses a ON a.user_id = u.id
            WHERE u.id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&*self.pool)
        .await?;

        Ok(row.as_ref().map(user_from_row))
    }

    pub async fn user_exists(&self, id: i64) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = ?)")
            .bind(id)
            .fetch_one(&*self.pool)
            .await
    }

    pub async fn email_exists(&self, email: &str) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE email = ?)")
            .bind(email)
            .fetch_one(&*self.pool)
            .await
    }

    pub async fn insert_user(&self, request: &CreateUserRequest) -> Result<User, sqlx::Error> {
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO users (first_name, last_name, email, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&request.first_name)
        .bind(&request.last_name)
        .bind(&request.email)
        .bind(now)
        .bind(now)
        .execute(&*self.pool)
        .await?;

        Ok(User {
            id: result.last_insert_rowid(),
            first_name: request.first_name.clone(),
            last_name: request.last_name.clone(),
            email: request.email.clone(),
            address: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Delete a user; the schema cascades to its address and posts.
    pub async fn delete_user(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&*self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // --- addresses ---

    /// Look up an address by its owning user. The foreign-key column is the
    /// lookup key here; address ids and user ids diverge once any address has
    /// been deleted and re-created.
    pub async fn get_address_by_user(&self, user_id: i64) -> Result<Option<Address>, sqlx::Error> {
        let row = sqlx::query(
            "SELECT id, street, city, state, zip_code, user_id, created_at, updated_at \
             FROM addresses WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&*self.pool)
        .await?;

        Ok(row.as_ref().map(address_from_row))
    }

    pub async fn insert_address(
        &self,
        request: &CreateAddressRequest,
    ) -> Result<Address, sqlx::Error> {
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO addresses (street, city, state, zip_code, user_id, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&request.street)
        .bind(&request.city)
        .bind(&request.state)
        .bind(&request.zip_code)
        .bind(request.user_id)
        .bind(now)
        .bind(now)
        .execute(&*self.pool)
        .await?;

        Ok(Address {
            id: result.last_insert_rowid(),
            street: request.street.clone(),
            city: request.city.clone(),
            state: request.state.clone(),
            zip_code: request.zip_code.clone(),
            user_id: request.user_id,
            created_at: now,
            updated_at: now,
        })
    }

    /// Replace every mutable field of `current`; the caller has already
    /// merged provided and existing values. Refreshes `updated_at`.
    pub async fn update_address(
        &self,
        current: &Address,
        street: String,
        city: String,
        state: String,
        zip_code: String,
    ) -> Result<Address, sqlx::Error> {
        let now = Utc::now();
        sqlx::query(
            "UPDATE addresses SET street = ?, city = ?, state = ?, zip_code = ?, updated_at = ? \
             WHERE id = ?",
        )
        .bind(&street)
        .bind(&city)
        .bind(&state)
        .bind(&zip_code)
        .bind(now)
        .bind(current.id)
        .execute(&*self.pool)
        .await?;

        Ok(Address {
            id: current.id,
            street,
            city,
            state,
            zip_code,
            user_id: current.user_id,
            created_at: current.created_at,
            updated_at: now,
        })
    }

    // --- posts ---

    pub async fn list_posts_by_user(&self, user_id: i64) -> Result<Vec<Post>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT id, title, body, user_id, created_at, updated_at \
             FROM posts WHERE user_id = ? \
             ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(&*self.pool)
        .await?;

        Ok(rows.iter().map(post_from_row).collect())
    }

    pub async fn get_post(&self, id: i64) -> Result<Option<Post>, sqlx::Error> {
        let row = sqlx::query(
            "SELECT id, title, body, user_id, created_at, updated_at FROM posts WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&*self.pool)
        .await?;

        Ok(row.as_ref().map(post_from_row))
    }

    pub async fn insert_post(&self, request: &CreatePostRequest) -> Result<Post, sqlx::Error> {
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO posts (title, body, user_id, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&request.title)
        .bind(&request.body)
        .bind(request.user_id)
        .bind(now)
        .bind(now)
        .execute(&*self.pool)
        .await?;

        Ok(Post {
            id: result.last_insert_rowid(),
            title: request.title.clone(),
            body: request.body.clone(),
            user_id: request.user_id,
            created_at: now,
            updated_at: now,
        })
    }

    pub async fn delete_post(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM posts WHERE id = ?")
            .bind(id)
            .execute(&*self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

fn user_from_row(row: &SqliteRow) -> User {
    let address = row
        .get::<Option<i64>, _>("address_id")
        .map(|address_id| Address {
            id: address_id,
            street: row.get("street"),
            city: row.get("city"),
            state: row.get("state"),
            zip_code: row.get("zip_code"),
            user_id: row.get("address_user_id"),
            created_at: row.get("address_created_at"),
            updated_at: row.get("address_updated_at"),
        });

    User {
        id: row.get("id"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        email: row.get("email"),
        address,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn address_from_row(row: &SqliteRow) -> Address {
    Address {
        id: row.get("id"),
        street: row.get("street"),
        city: row.get("city"),
        state: row.get("state"),
        zip_code: row.get("zip_code"),
        user_id: row.get("user_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn post_from_row(row: &SqliteRow) -> Post {
    Post {
        id: row.get("id"),
        title: row.get("title"),
        body: row.get("body"),
        user_id: row.get("user_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
