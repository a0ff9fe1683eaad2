//! # User Repository
//!
//! Storefront users, their saved cart and their order history.
//!
//! The cart is stored as a JSON array on the user row. History entries live
//! in `user_orders` and are only ever appended, by the checkout transaction.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use tatylu_core::ids::new_object_id;
use tatylu_core::validation::validate_email;
use tatylu_core::{CartLine, CoreError, OrderHistoryEntry, User};

const USER_COLUMNS: &str = "id, nombre, apellido, email, telefono, cedula, cart, created_at";

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: String,
    nombre: String,
    apellido: String,
    email: String,
    telefono: String,
    cedula: String,
    cart: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = DbError;

    fn try_from(row: UserRow) -> DbResult<Self> {
        Ok(User {
            cart: serde_json::from_str(&row.cart)?,
            id: row.id,
            nombre: row.nombre,
            apellido: row.apellido,
            email: row.email,
            telefono: row.telefono,
            cedula: row.cedula,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct HistoryRow {
    order_id: String,
    order_code: Option<i64>,
    placed_at: DateTime<Utc>,
    summary: String,
}

/// Fields for a new user.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub nombre: String,
    pub apellido: String,
    pub email: String,
    pub telefono: String,
    pub cedula: String,
}

/// Repository for user database operations.
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    /// Creates a new UserRepository.
    pub fn new(pool: SqlitePool) -> Self {
        UserRepository { pool }
    }

    /// Gets a user by ID.
    ///
    /// ## Returns
    /// * `Ok(Some(User))` - User found
    /// * `Ok(None)` - User not found
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS);
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(User::try_from).transpose()
    }

    /// Gets a user by email (case-insensitive).
    pub async fn get_by_email(&self, email: &str) -> DbResult<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE lower(email) = lower(?1)", USER_COLUMNS);
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(email.trim())
            .fetch_optional(&self.pool)
            .await?;

        row.map(User::try_from).transpose()
    }

    /// Inserts a new user with an empty cart.
    ///
    /// ## Returns
    /// * `Err(DbError::Domain)` - Email is not a valid address
    /// * `Err(DbError::UniqueViolation)` - Email already registered
    pub async fn insert(&self, new: NewUser) -> DbResult<User> {
        validate_email(&new.email).map_err(CoreError::from)?;

        let user = User {
            id: new_object_id(),
            nombre: new.nombre.trim().to_string(),
            apellido: new.apellido.trim().to_string(),
            email: new.email.trim().to_string(),
            telefono: new.telefono.trim().to_string(),
            cedula: new.cedula.trim().to_string(),
            cart: Vec::new(),
            created_at: Utc::now(),
        };

        debug!(id = %user.id, "Inserting user");

        sqlx::query(
            r#"
            INSERT INTO users (id, nombre, apellido, email, telefono, cedula, cart, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, '[]', ?7)
            "#,
        )
        .bind(&user.id)
        .bind(&user.nombre)
        .bind(&user.apellido)
        .bind(&user.email)
        .bind(&user.telefono)
        .bind(&user.cedula)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::duplicate("email", user.email.clone()),
            other => other,
        })?;

        Ok(user)
    }

    /// Replaces a user's saved cart.
    pub async fn set_cart(&self, id: &str, cart: &[CartLine]) -> DbResult<()> {
        let json = serde_json::to_string(cart)?;
        let result = sqlx::query("UPDATE users SET cart = ?2 WHERE id = ?1")
            .bind(id)
            .bind(json)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", id));
        }

        debug!(id = %id, lines = cart.len(), "Cart saved");
        Ok(())
    }

    /// A user's order history, oldest first.
    pub async fn history(&self, user_id: &str) -> DbResult<Vec<OrderHistoryEntry>> {
        let rows = sqlx::query_as::<_, HistoryRow>(
            r#"
            SELECT order_id, order_code, placed_at, summary
            FROM user_orders
            WHERE user_id = ?1
            ORDER BY id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(OrderHistoryEntry {
                    order_id: row.order_id,
                    order_code: row.order_code,
                    placed_at: row.placed_at,
                    summary: serde_json::from_str(&row.summary)?,
                })
            })
            .collect()
    }

    /// Appends a history entry and empties the cart on an open connection.
    ///
    /// Used by the checkout transaction; the caller owns commit/rollback.
    pub(crate) async fn record_purchase(
        conn: &mut SqliteConnection,
        user_id: &str,
        entry: &OrderHistoryEntry,
    ) -> DbResult<()> {
        let summary = serde_json::to_string(&entry.summary)?;

        sqlx::query(
            r#"
            INSERT INTO user_orders (user_id, order_id, order_code, placed_at, summary)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(user_id)
        .bind(&entry.order_id)
        .bind(entry.order_code)
        .bind(entry.placed_at)
        .bind(summary)
        .execute(&mut *conn)
        .await?;

        let result = sqlx::query("UPDATE users SET cart = '[]' WHERE id = ?1")
            .bind(user_id)
            .execute(&mut *conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::UserNotFound(user_id.to_string()).into());
        }

        Ok(())
    }

    /// Counts total users.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};

    fn ana() -> NewUser {
        NewUser {
            nombre: "Ana".into(),
            apellido: "Pérez".into(),
            email: "ana@example.com".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_insert_and_lookup() {
        let repo = Database::new(DbConfig::in_memory()).await.unwrap().users();
        let user = repo.insert(ana()).await.unwrap();

        let by_id = repo.get_by_id(&user.id).await.unwrap().unwrap();
        assert_eq!(by_id, user);
        let by_email = repo.get_by_email("ANA@example.com").await.unwrap().unwrap();
        assert_eq!(by_email.id, user.id);
        assert!(repo.get_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_and_invalid_email() {
        let repo = Database::new(DbConfig::in_memory()).await.unwrap().users();
        repo.insert(ana()).await.unwrap();

        let err = repo.insert(ana()).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));

        let bad = NewUser {
            email: "not-an-email".into(),
            ..ana()
        };
        let err = repo.insert(bad).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::Validation(_))));
    }

    #[tokio::test]
    async fn test_cart_round_trip() {
        let repo = Database::new(DbConfig::in_memory()).await.unwrap().users();
        let user = repo.insert(ana()).await.unwrap();

        let cart = vec![CartLine {
            product_id: new_object_id(),
            quantity: 3,
        }];
        repo.set_cart(&user.id, &cart).await.unwrap();
        assert_eq!(repo.get_by_id(&user.id).await.unwrap().unwrap().cart, cart);

        let err = repo.set_cart("missing", &cart).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
        assert!(repo.history(&user.id).await.unwrap().is_empty());
    }
}
