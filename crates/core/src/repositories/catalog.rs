//! Catalog store: medicines and billable actions.
//!
//! The ledger reads prices and stock from here and, for paid records, decrements medicine
//! stock. Everything else about the catalog (registration, price changes, retiring actions)
//! is a thin write path used by the CLI and by tests.
//!
//! Connection-level functions take `&mut SqliteConnection` so that they run unchanged inside
//! a ledger transaction or on a pooled connection.

use crate::constants::{ACTION_ENTITY, MEDICINE_ENTITY};
use crate::error::{ClinicError, ClinicResult};
use crate::{NonEmptyText, Quantity};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Medicine {
    pub id: Uuid,
    pub name: String,
    pub price: i64,
    pub stock: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Action {
    pub id: Uuid,
    pub name: String,
    pub price: i64,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug)]
pub struct NewMedicine {
    pub name: NonEmptyText,
    pub price: i64,
    pub stock: i64,
}

#[derive(Clone, Debug)]
pub struct NewAction {
    pub name: NonEmptyText,
    pub price: i64,
    pub description: Option<String>,
}

fn ensure_non_negative(field: &str, value: i64) -> ClinicResult<()> {
    if value < 0 {
        return Err(ClinicError::InvalidInput(format!(
            "{field} cannot be negative, got {value}"
        )));
    }
    Ok(())
}

pub async fn insert_medicine(
    conn: &mut SqliteConnection,
    new: &NewMedicine,
) -> ClinicResult<Medicine> {
    ensure_non_negative("price", new.price)?;
    ensure_non_negative("stock", new.stock)?;

    let medicine = Medicine {
        id: Uuid::new_v4(),
        name: new.name.as_str().to_owned(),
        price: new.price,
        stock: new.stock,
        created_at: Utc::now(),
    };

    sqlx::query(
        "INSERT INTO medicines (id, name, price, stock, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
    )
    .bind(medicine.id)
    .bind(&medicine.name)
    .bind(medicine.price)
    .bind(medicine.stock)
    .bind(medicine.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(medicine)
}

pub async fn insert_action(conn: &mut SqliteConnection, new: &NewAction) -> ClinicResult<Action> {
    ensure_non_negative("price", new.price)?;

    let action = Action {
        id: Uuid::new_v4(),
        name: new.name.as_str().to_owned(),
        price: new.price,
        description: new
            .description
            .as_ref()
            .map(|d| d.trim().to_owned())
            .filter(|d| !d.is_empty()),
        created_at: Utc::now(),
        deleted_at: None,
    };

    sqlx::query(
        "INSERT INTO actions (id, name, price, description, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )
    .bind(action.id)
    .bind(&action.name)
    .bind(action.price)
    .bind(&action.description)
    .bind(action.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(action)
}

/// Looks up a medicine by id.
///
/// # Errors
///
/// Returns `ClinicError::NotFound` if no medicine has this id.
pub async fn get_medicine(conn: &mut SqliteConnection, id: Uuid) -> ClinicResult<Medicine> {
    sqlx::query_as::<_, Medicine>(
        "SELECT id, name, price, stock, created_at FROM medicines WHERE id = ?1",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(ClinicError::NotFound {
        entity: MEDICINE_ENTITY,
        id,
    })
}

/// Looks up an action by id, ignoring retired actions.
///
/// # Errors
///
/// Returns `ClinicError::NotFound` if the action does not exist or has been retired.
pub async fn get_action(conn: &mut SqliteConnection, id: Uuid) -> ClinicResult<Action> {
    sqlx::query_as::<_, Action>(
        "SELECT id, name, price, description, created_at, deleted_at
         FROM actions WHERE id = ?1 AND deleted_at IS NULL",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(ClinicError::NotFound {
        entity: ACTION_ENTITY,
        id,
    })
}

/// Removes `quantity` units from a medicine's stock and returns what is left.
///
/// The decrement is a single conditional `UPDATE`, so the availability check and the write
/// are atomic with respect to other writers. Stock can never go below zero.
///
/// # Errors
///
/// - `ClinicError::InsufficientStock` if fewer than `quantity` units remain.
/// - `ClinicError::NotFound` if the medicine does not exist.
pub async fn decrement_medicine_stock(
    conn: &mut SqliteConnection,
    id: Uuid,
    quantity: Quantity,
) -> ClinicResult<i64> {
    let requested = quantity.as_i64();
    let remaining: Option<i64> = sqlx::query_scalar(
        "UPDATE medicines SET stock = stock - ?1, updated_at = ?2
         WHERE id = ?3 AND stock >= ?1
         RETURNING stock",
    )
    .bind(requested)
    .bind(Utc::now())
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    match remaining {
        Some(stock) => Ok(stock),
        None => {
            let medicine = get_medicine(conn, id).await?;
            tracing::warn!(
                "stock decrement refused for medicine {}: requested {}, available {}",
                id,
                requested,
                medicine.stock
            );
            Err(ClinicError::InsufficientStock {
                medicine_id: id,
                requested,
                available: medicine.stock,
            })
        }
    }
}

/// Overwrites a medicine's stock level.
///
/// # Errors
///
/// - `ClinicError::InvalidInput` if `stock` is negative.
/// - `ClinicError::NotFound` if the medicine does not exist.
pub async fn set_medicine_stock(
    conn: &mut SqliteConnection,
    id: Uuid,
    stock: i64,
) -> ClinicResult<i64> {
    ensure_non_negative("stock", stock)?;

    sqlx::query_scalar::<_, i64>(
        "UPDATE medicines SET stock = ?1, updated_at = ?2 WHERE id = ?3 RETURNING stock",
    )
    .bind(stock)
    .bind(Utc::now())
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(ClinicError::NotFound {
        entity: MEDICINE_ENTITY,
        id,
    })
}

pub async fn set_medicine_price(
    conn: &mut SqliteConnection,
    id: Uuid,
    price: i64,
) -> ClinicResult<i64> {
    ensure_non_negative("price", price)?;

    sqlx::query_scalar::<_, i64>(
        "UPDATE medicines SET price = ?1, updated_at = ?2 WHERE id = ?3 RETURNING price",
    )
    .bind(price)
    .bind(Utc::now())
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(ClinicError::NotFound {
        entity: MEDICINE_ENTITY,
        id,
    })
}

/// Marks an action as retired so it can no longer be billed.
pub async fn retire_action(conn: &mut SqliteConnection, id: Uuid) -> ClinicResult<()> {
    let result = sqlx::query(
        "UPDATE actions SET deleted_at = ?1 WHERE id = ?2 AND deleted_at IS NULL",
    )
    .bind(Utc::now())
    .bind(id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ClinicError::NotFound {
            entity: ACTION_ENTITY,
            id,
        });
    }
    Ok(())
}

/// Pool-backed entry point to the catalog for callers outside a ledger transaction.
#[derive(Clone, Debug)]
pub struct CatalogService {
    pool: SqlitePool,
}

impl CatalogService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn add_medicine(&self, new: NewMedicine) -> ClinicResult<Medicine> {
        let mut conn = self.pool.acquire().await?;
        let medicine = insert_medicine(&mut conn, &new).await?;
        tracing::info!("registered medicine {} ({})", medicine.id, medicine.name);
        Ok(medicine)
    }

    pub async fn add_action(&self, new: NewAction) -> ClinicResult<Action> {
        let mut conn = self.pool.acquire().await?;
        let action = insert_action(&mut conn, &new).await?;
        tracing::info!("registered action {} ({})", action.id, action.name);
        Ok(action)
    }

    pub async fn medicine(&self, id: Uuid) -> ClinicResult<Medicine> {
        let mut conn = self.pool.acquire().await?;
        get_medicine(&mut conn, id).await
    }

    pub async fn action(&self, id: Uuid) -> ClinicResult<Action> {
        let mut conn = self.pool.acquire().await?;
        get_action(&mut conn, id).await
    }

    pub async fn set_medicine_price(&self, id: Uuid, price: i64) -> ClinicResult<i64> {
        let mut conn = self.pool.acquire().await?;
        set_medicine_price(&mut conn, id, price).await
    }

    pub async fn set_medicine_stock(&self, id: Uuid, stock: i64) -> ClinicResult<i64> {
        let mut conn = self.pool.acquire().await?;
        set_medicine_stock(&mut conn, id, stock).await
    }

    pub async fn retire_action(&self, id: Uuid) -> ClinicResult<()> {
        let mut conn = self.pool.acquire().await?;
        retire_action(&mut conn, id).await?;
        tracing::info!("retired action {}", id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::migrated_pool;

    fn paracetamol(stock: i64) -> NewMedicine {
        NewMedicine {
            name: NonEmptyText::new("Paracetamol").unwrap(),
            price: 1_500,
            stock,
        }
    }

    #[tokio::test]
    async fn inserted_medicine_can_be_read_back() {
        let catalog = CatalogService::new(migrated_pool().await);
        let created = catalog.add_medicine(paracetamol(10)).await.unwrap();

        let fetched = catalog.medicine(created.id).await.unwrap();
        assert_eq!(fetched.name, "Paracetamol");
        assert_eq!(fetched.price, 1_500);
        assert_eq!(fetched.stock, 10);
    }

    #[tokio::test]
    async fn unknown_medicine_is_not_found() {
        let catalog = CatalogService::new(migrated_pool().await);
        let id = Uuid::new_v4();

        match catalog.medicine(id).await {
            Err(ClinicError::NotFound { entity, id: missing }) => {
                assert_eq!(entity, MEDICINE_ENTITY);
                assert_eq!(missing, id);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn negative_price_or_stock_is_rejected() {
        let catalog = CatalogService::new(migrated_pool().await);
        let mut bad = paracetamol(-1);
        assert!(matches!(
            catalog.add_medicine(bad.clone()).await,
            Err(ClinicError::InvalidInput(_))
        ));

        bad.stock = 1;
        bad.price = -5;
        assert!(matches!(
            catalog.add_medicine(bad).await,
            Err(ClinicError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn decrement_refuses_to_go_below_zero() {
        let pool = migrated_pool().await;
        let catalog = CatalogService::new(pool.clone());
        let medicine = catalog.add_medicine(paracetamol(3)).await.unwrap();

        let mut conn = pool.acquire().await.unwrap();
        let left = decrement_medicine_stock(&mut conn, medicine.id, Quantity::new(2).unwrap())
            .await
            .unwrap();
        assert_eq!(left, 1);

        let err = decrement_medicine_stock(&mut conn, medicine.id, Quantity::new(2).unwrap())
            .await
            .expect_err("only one unit remains");
        match err {
            ClinicError::InsufficientStock {
                requested,
                available,
                ..
            } => {
                assert_eq!(requested, 2);
                assert_eq!(available, 1);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        drop(conn);

        assert_eq!(catalog.medicine(medicine.id).await.unwrap().stock, 1);
    }

    #[tokio::test]
    async fn decrement_of_unknown_medicine_is_not_found() {
        let pool = migrated_pool().await;
        let mut conn = pool.acquire().await.unwrap();

        let err = decrement_medicine_stock(&mut conn, Uuid::new_v4(), Quantity::new(1).unwrap())
            .await
            .expect_err("medicine does not exist");
        assert!(matches!(err, ClinicError::NotFound { .. }));
    }

    #[tokio::test]
    async fn retired_action_is_hidden_from_lookup() {
        let catalog = CatalogService::new(migrated_pool().await);
        let action = catalog
            .add_action(NewAction {
                name: NonEmptyText::new("Consultation").unwrap(),
                price: 5_000,
                description: Some("  ".into()),
            })
            .await
            .unwrap();
        assert_eq!(action.description, None, "blank description is stored as none");
        assert!(catalog.action(action.id).await.is_ok());

        catalog.retire_action(action.id).await.unwrap();

        assert!(matches!(
            catalog.action(action.id).await,
            Err(ClinicError::NotFound { .. })
        ));
        assert!(
            matches!(
                catalog.retire_action(action.id).await,
                Err(ClinicError::NotFound { .. })
            ),
            "retiring twice reports not found"
        );
    }

    #[tokio::test]
    async fn price_and_stock_updates_return_new_values() {
        let catalog = CatalogService::new(migrated_pool().await);
        let medicine = catalog.add_medicine(paracetamol(10)).await.unwrap();

        assert_eq!(
            catalog.set_medicine_price(medicine.id, 2_000).await.unwrap(),
            2_000
        );
        assert_eq!(catalog.set_medicine_stock(medicine.id, 4).await.unwrap(), 4);
        assert!(matches!(
            catalog.set_medicine_stock(medicine.id, -1).await,
            Err(ClinicError::InvalidInput(_))
        ));
        assert!(matches!(
            catalog.set_medicine_price(Uuid::new_v4(), 1).await,
            Err(ClinicError::NotFound { .. })
        ));
    }
}
