//! Ledger store: medical record headers and their line items.
//!
//! Plain persistence with no business rules. Ordering and ownership are enforced by the
//! schema: each line carries its header id (cascade on delete) and a per-header `position`.
//! Line reads left-join the catalog so callers get the live catalog view next to the
//! snapshot taken at billing time.

use crate::constants::MEDICAL_RECORD_ENTITY;
use crate::error::{ClinicError, ClinicResult};
use crate::medical_record::{
    ActionLineItem, CurrentAction, CurrentMedicine, MedicineLineItem, Totals,
};
use crate::repositories::catalog::{Action, Medicine};
use crate::Quantity;
use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use uuid::Uuid;

/// Header row as stored, without line items.
#[derive(Clone, Debug, PartialEq, Eq, sqlx::FromRow)]
pub struct HeaderRow {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub diagnosis_result: String,
    pub total_medicine_amount: i64,
    pub total_action_amount: i64,
    pub total_amount: i64,
    pub payment_status: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct MedicineLineRow {
    id: Uuid,
    medical_record_id: Uuid,
    medicine_id: Uuid,
    medicine_name: String,
    unit_price: i64,
    quantity: i64,
    stock_after: Option<i64>,
    current_name: Option<String>,
    current_price: Option<i64>,
    current_stock: Option<i64>,
}

impl TryFrom<MedicineLineRow> for MedicineLineItem {
    type Error = ClinicError;

    fn try_from(row: MedicineLineRow) -> ClinicResult<Self> {
        let quantity = Quantity::new(row.quantity).map_err(|e| {
            ClinicError::InvalidStoredValue(format!("medicine line {}: {e}", row.id))
        })?;

        let current = match (row.current_name, row.current_price, row.current_stock) {
            (Some(name), Some(price), Some(stock)) => Some(CurrentMedicine { name, price, stock }),
            _ => None,
        };

        Ok(MedicineLineItem {
            id: row.id,
            medical_record_id: row.medical_record_id,
            medicine_id: row.medicine_id,
            medicine_name: row.medicine_name,
            unit_price: row.unit_price,
            quantity,
            stock_after: row.stock_after,
            current,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ActionLineRow {
    id: Uuid,
    medical_record_id: Uuid,
    action_id: Uuid,
    action_name: String,
    action_price: i64,
    action_description: Option<String>,
    current_name: Option<String>,
    current_price: Option<i64>,
    current_description: Option<String>,
    current_deleted_at: Option<DateTime<Utc>>,
}

impl From<ActionLineRow> for ActionLineItem {
    fn from(row: ActionLineRow) -> Self {
        let current = match (row.current_name, row.current_price) {
            (Some(name), Some(price)) => Some(CurrentAction {
                name,
                price,
                description: row.current_description,
                retired: row.current_deleted_at.is_some(),
            }),
            _ => None,
        };

        ActionLineItem {
            id: row.id,
            medical_record_id: row.medical_record_id,
            action_id: row.action_id,
            action_name: row.action_name,
            action_price: row.action_price,
            action_description: row.action_description,
            current,
        }
    }
}

/// Inserts a header with zero totals and returns its id and creation time.
pub async fn insert_header(
    conn: &mut SqliteConnection,
    booking_id: Uuid,
    diagnosis_result: &str,
    payment_status: bool,
) -> ClinicResult<(Uuid, DateTime<Utc>)> {
    let id = Uuid::new_v4();
    let created_at = Utc::now();

    sqlx::query(
        "INSERT INTO medical_records
            (id, booking_id, diagnosis_result, total_medicine_amount, total_action_amount,
             total_amount, payment_status, created_at, updated_at)
         VALUES (?1, ?2, ?3, 0, 0, 0, ?4, ?5, ?5)",
    )
    .bind(id)
    .bind(booking_id)
    .bind(diagnosis_result)
    .bind(payment_status)
    .bind(created_at)
    .execute(&mut *conn)
    .await?;

    Ok((id, created_at))
}

/// Inserts a medicine line with the catalog name and price frozen from `medicine`.
pub async fn insert_medicine_line(
    conn: &mut SqliteConnection,
    header_id: Uuid,
    position: usize,
    medicine: &Medicine,
    quantity: Quantity,
) -> ClinicResult<Uuid> {
    let id = Uuid::new_v4();

    sqlx::query(
        "INSERT INTO medical_record_medicines
            (id, medical_record_id, position, medicine_id, medicine_name, unit_price, quantity)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )
    .bind(id)
    .bind(header_id)
    .bind(position_value(position)?)
    .bind(medicine.id)
    .bind(&medicine.name)
    .bind(medicine.price)
    .bind(quantity.as_i64())
    .execute(&mut *conn)
    .await?;

    Ok(id)
}

pub async fn set_line_stock_after(
    conn: &mut SqliteConnection,
    line_id: Uuid,
    stock_after: i64,
) -> ClinicResult<()> {
    sqlx::query("UPDATE medical_record_medicines SET stock_after = ?1 WHERE id = ?2")
        .bind(stock_after)
        .bind(line_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Inserts an action line with the catalog name, price and description frozen from `action`.
pub async fn insert_action_line(
    conn: &mut SqliteConnection,
    header_id: Uuid,
    position: usize,
    action: &Action,
) -> ClinicResult<Uuid> {
    let id = Uuid::new_v4();

    sqlx::query(
        "INSERT INTO medical_record_actions
            (id, medical_record_id, position, action_id, action_name, action_price,
             action_description)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )
    .bind(id)
    .bind(header_id)
    .bind(position_value(position)?)
    .bind(action.id)
    .bind(&action.name)
    .bind(action.price)
    .bind(&action.description)
    .execute(&mut *conn)
    .await?;

    Ok(id)
}

pub async fn update_header_totals(
    conn: &mut SqliteConnection,
    header_id: Uuid,
    totals: &Totals,
) -> ClinicResult<()> {
    let total_amount = totals.total()?;

    sqlx::query(
        "UPDATE medical_records
         SET total_medicine_amount = ?1, total_action_amount = ?2, total_amount = ?3,
             updated_at = ?4
         WHERE id = ?5",
    )
    .bind(totals.medicine)
    .bind(totals.action)
    .bind(total_amount)
    .bind(Utc::now())
    .bind(header_id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Flips an unpaid, non-deleted header to paid.
///
/// Returns `false` when no row matched: the header is unknown, deleted or already paid.
/// Being a write, this takes the database write lock, so a concurrent claim on the same
/// header waits and then sees it paid.
pub async fn claim_unpaid_header(
    conn: &mut SqliteConnection,
    header_id: Uuid,
) -> ClinicResult<bool> {
    let result = sqlx::query(
        "UPDATE medical_records SET payment_status = 1, updated_at = ?1
         WHERE id = ?2 AND deleted_at IS NULL AND payment_status = 0",
    )
    .bind(Utc::now())
    .bind(header_id)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Lists non-deleted headers, oldest first.
pub async fn list_headers(conn: &mut SqliteConnection) -> ClinicResult<Vec<HeaderRow>> {
    let rows = sqlx::query_as::<_, HeaderRow>(
        "SELECT id, booking_id, diagnosis_result, total_medicine_amount, total_action_amount,
                total_amount, payment_status, created_at
         FROM medical_records
         WHERE deleted_at IS NULL
         ORDER BY created_at, rowid",
    )
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows)
}

/// Fetches one non-deleted header.
///
/// # Errors
///
/// Returns `ClinicError::NotFound` if the id is unknown or the record was deleted.
pub async fn get_header(conn: &mut SqliteConnection, id: Uuid) -> ClinicResult<HeaderRow> {
    sqlx::query_as::<_, HeaderRow>(
        "SELECT id, booking_id, diagnosis_result, total_medicine_amount, total_action_amount,
                total_amount, payment_status, created_at
         FROM medical_records
         WHERE id = ?1 AND deleted_at IS NULL",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(ClinicError::NotFound {
        entity: MEDICAL_RECORD_ENTITY,
        id,
    })
}

pub async fn list_medicine_lines(
    conn: &mut SqliteConnection,
    header_id: Uuid,
) -> ClinicResult<Vec<MedicineLineItem>> {
    let rows = sqlx::query_as::<_, MedicineLineRow>(
        "SELECT l.id, l.medical_record_id, l.medicine_id, l.medicine_name, l.unit_price,
                l.quantity, l.stock_after,
                m.name AS current_name, m.price AS current_price, m.stock AS current_stock
         FROM medical_record_medicines l
         LEFT JOIN medicines m ON m.id = l.medicine_id
         WHERE l.medical_record_id = ?1
         ORDER BY l.position",
    )
    .bind(header_id)
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter().map(MedicineLineItem::try_from).collect()
}

pub async fn list_action_lines(
    conn: &mut SqliteConnection,
    header_id: Uuid,
) -> ClinicResult<Vec<ActionLineItem>> {
    let rows = sqlx::query_as::<_, ActionLineRow>(
        "SELECT l.id, l.medical_record_id, l.action_id, l.action_name, l.action_price,
                l.action_description,
                a.name AS current_name, a.price AS current_price,
                a.description AS current_description, a.deleted_at AS current_deleted_at
         FROM medical_record_actions l
         LEFT JOIN actions a ON a.id = l.action_id
         WHERE l.medical_record_id = ?1
         ORDER BY l.position",
    )
    .bind(header_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.into_iter().map(ActionLineItem::from).collect())
}

fn position_value(position: usize) -> ClinicResult<i64> {
    i64::try_from(position)
        .map_err(|_| ClinicError::InvalidInput(format!("too many line items ({position})")))
}
