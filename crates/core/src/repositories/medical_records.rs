//! Medical record ledger.
//!
//! Creates bills from a diagnosis and a list of medicines and actions, reads them back, and
//! moves unpaid bills to paid. The service handles:
//!
//! - Price snapshotting: each line stores the catalog name and price at billing time
//! - Stock dispensing: paid lines decrement catalog stock, never below zero
//! - Totals: medicine, action and grand totals written back onto the header
//!
//! ## Atomicity
//!
//! Every write path runs in a single database transaction held by an `sqlx::Transaction`
//! guard. Returning early with `?` drops the guard, which rolls back the header, all lines and
//! all stock changes. The whole transaction is bounded by
//! [`CoreConfig::transaction_timeout`]; on expiry the in-flight work is dropped and rolled
//! back the same way.
//!
//! ## Reads
//!
//! Read paths return the frozen snapshot fields together with a `current` view joined from
//! the live catalog. The two can differ once catalog prices or stock change.

use crate::config::CoreConfig;
use crate::constants::MEDICAL_RECORD_ENTITY;
use crate::error::{ClinicError, ClinicResult};
use crate::medical_record::{
    ActionLineItem, MedicalRecord, MedicineLineItem, NewMedicalRecord, Totals,
};
use crate::repositories::catalog;
use crate::repositories::ledger::{self, HeaderRow};
use crate::Quantity;
use sqlx::{SqliteConnection, SqlitePool};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Service for creating, reading and settling medical records.
#[derive(Clone, Debug)]
pub struct MedicalRecordService {
    cfg: Arc<CoreConfig>,
    pool: SqlitePool,
}

impl MedicalRecordService {
    pub fn new(cfg: Arc<CoreConfig>, pool: SqlitePool) -> Self {
        Self { cfg, pool }
    }

    /// Creates a medical record with snapshotted prices and computed totals.
    ///
    /// Medicines and actions are processed in the order given. When `payment_status` is
    /// true, each medicine line is dispensed immediately and its `stock_after` is filled in.
    ///
    /// # Errors
    ///
    /// Returns `ClinicError` if:
    /// - a medicine or action is unknown, or an action is retired (`NotFound`)
    /// - a paid line asks for more than the remaining stock (`InsufficientStock`)
    /// - totals overflow (`AmountOverflow`)
    /// - the transaction outlives its deadline (`TransactionTimeout`)
    /// - the database fails (`Storage`)
    ///
    /// In every error case nothing is persisted.
    pub async fn create(&self, request: NewMedicalRecord) -> ClinicResult<MedicalRecord> {
        let record = with_deadline(self.cfg.transaction_timeout(), async {
            let mut tx = self.pool.begin().await?;
            let record = create_in_tx(&mut tx, &request).await?;
            tx.commit().await?;
            Ok::<_, ClinicError>(record)
        })
        .await
        .inspect_err(|e| log_failure("create medical record", e))?;

        tracing::info!(
            "created medical record {} for booking {}: total {} ({} medicine lines, {} action lines, paid: {})",
            record.id,
            record.booking_id,
            record.total_amount,
            record.medicine_details.len(),
            record.action_details.len(),
            record.payment_status
        );
        Ok(record)
    }

    /// Lists all non-deleted records with their line items, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `ClinicError::NoneFound` if there are no records.
    pub async fn list(&self) -> ClinicResult<Vec<MedicalRecord>> {
        let mut conn = self.pool.acquire().await?;
        let headers = ledger::list_headers(&mut conn).await?;
        if headers.is_empty() {
            return Err(ClinicError::NoneFound(MEDICAL_RECORD_ENTITY));
        }

        let mut records = Vec::with_capacity(headers.len());
        for header in headers {
            records.push(assemble(&mut conn, header).await?);
        }
        Ok(records)
    }

    /// Fetches one non-deleted record with its line items.
    ///
    /// # Errors
    ///
    /// Returns `ClinicError::NotFound` if the id is unknown.
    pub async fn get(&self, id: Uuid) -> ClinicResult<MedicalRecord> {
        let mut conn = self.pool.acquire().await?;
        let header = ledger::get_header(&mut conn, id).await?;
        assemble(&mut conn, header).await
    }

    /// Marks an unpaid record as paid, dispensing all of its medicine lines.
    ///
    /// Stock is checked and decremented line by line in record order. If any line cannot be
    /// covered, all decrements made so far are rolled back and the record stays unpaid.
    ///
    /// # Errors
    ///
    /// Returns `ClinicError` if:
    /// - the record is unknown (`NotFound`)
    /// - the record is already paid (`AlreadyPaid`)
    /// - a line asks for more than the remaining stock (`InsufficientStock`)
    /// - the transaction outlives its deadline or the database fails
    pub async fn mark_paid(&self, id: Uuid) -> ClinicResult<MedicalRecord> {
        let record = with_deadline(self.cfg.transaction_timeout(), async {
            let mut tx = self.pool.begin().await?;
            let record = mark_paid_in_tx(&mut tx, id).await?;
            tx.commit().await?;
            Ok::<_, ClinicError>(record)
        })
        .await
        .inspect_err(|e| log_failure("mark medical record paid", e))?;

        tracing::info!(
            "medical record {} marked as paid ({} medicine lines dispensed)",
            id,
            record.medicine_details.len()
        );
        Ok(record)
    }
}

async fn with_deadline<T>(
    limit: Duration,
    work: impl Future<Output = ClinicResult<T>>,
) -> ClinicResult<T> {
    tokio::time::timeout(limit, work)
        .await
        .map_err(|_| ClinicError::TransactionTimeout(limit))?
}

fn log_failure(operation: &str, e: &ClinicError) {
    if e.is_client_error() {
        tracing::warn!("{} rejected: {}", operation, e);
    } else {
        tracing::error!("{} failed: {:?}", operation, e);
    }
}

async fn create_in_tx(
    conn: &mut SqliteConnection,
    request: &NewMedicalRecord,
) -> ClinicResult<MedicalRecord> {
    let (id, created_at) = ledger::insert_header(
        conn,
        request.booking_id,
        &request.diagnosis_result,
        request.payment_status,
    )
    .await?;

    let mut totals = Totals::default();

    let mut medicine_details = Vec::with_capacity(request.medicines.len());
    for (position, order) in request.medicines.iter().enumerate() {
        let medicine = catalog::get_medicine(conn, order.medicine_id).await?;
        let line_id =
            ledger::insert_medicine_line(conn, id, position, &medicine, order.quantity).await?;

        let stock_after = if request.payment_status {
            Some(dispense(conn, line_id, medicine.id, medicine.stock, order.quantity).await?)
        } else {
            None
        };

        totals.add_medicine(medicine.price, order.quantity)?;
        tracing::debug!(
            "medical record {} line {}: medicine {} x{} at {}",
            id,
            position,
            medicine.id,
            order.quantity,
            medicine.price
        );

        medicine_details.push(MedicineLineItem {
            id: line_id,
            medical_record_id: id,
            medicine_id: medicine.id,
            medicine_name: medicine.name,
            unit_price: medicine.price,
            quantity: order.quantity,
            stock_after,
            current: None,
        });
    }

    let mut action_details = Vec::with_capacity(request.actions.len());
    for (position, action_id) in request.actions.iter().enumerate() {
        let action = catalog::get_action(conn, *action_id).await?;
        let line_id = ledger::insert_action_line(conn, id, position, &action).await?;

        totals.add_action(action.price)?;

        action_details.push(ActionLineItem {
            id: line_id,
            medical_record_id: id,
            action_id: action.id,
            action_name: action.name,
            action_price: action.price,
            action_description: action.description,
            current: None,
        });
    }

    ledger::update_header_totals(conn, id, &totals).await?;

    Ok(MedicalRecord {
        id,
        booking_id: request.booking_id,
        diagnosis_result: request.diagnosis_result.clone(),
        total_medicine_amount: totals.medicine,
        total_action_amount: totals.action,
        total_amount: totals.total()?,
        payment_status: request.payment_status,
        medicine_details,
        action_details,
        created_at,
    })
}

/// Claims the header before any read so the transaction holds the write lock from its first
/// statement. The returned record is assembled before commit.
async fn mark_paid_in_tx(conn: &mut SqliteConnection, id: Uuid) -> ClinicResult<MedicalRecord> {
    if !ledger::claim_unpaid_header(conn, id).await? {
        // Unknown or deleted surfaces as NotFound here.
        ledger::get_header(conn, id).await?;
        return Err(ClinicError::AlreadyPaid(id));
    }

    for line in ledger::list_medicine_lines(conn, id).await? {
        // Re-read per line: an earlier line may have drawn on the same medicine.
        let available = catalog::get_medicine(conn, line.medicine_id).await?.stock;
        dispense(conn, line.id, line.medicine_id, available, line.quantity).await?;
    }

    let header = ledger::get_header(conn, id).await?;
    assemble(conn, header).await
}

/// Takes `quantity` units out of stock for one line and records what is left on the line.
///
/// `available` is the stock the caller last read; it is checked first so that nothing is
/// written when it is already short. The guarded decrement then re-checks atomically.
async fn dispense(
    conn: &mut SqliteConnection,
    line_id: Uuid,
    medicine_id: Uuid,
    available: i64,
    quantity: Quantity,
) -> ClinicResult<i64> {
    if quantity.as_i64() > available {
        return Err(ClinicError::InsufficientStock {
            medicine_id,
            requested: quantity.as_i64(),
            available,
        });
    }

    let stock_after = catalog::decrement_medicine_stock(conn, medicine_id, quantity).await?;
    ledger::set_line_stock_after(conn, line_id, stock_after).await?;
    Ok(stock_after)
}

async fn assemble(conn: &mut SqliteConnection, header: HeaderRow) -> ClinicResult<MedicalRecord> {
    let medicine_details = ledger::list_medicine_lines(conn, header.id).await?;
    let action_details = ledger::list_action_lines(conn, header.id).await?;

    Ok(MedicalRecord {
        id: header.id,
        booking_id: header.booking_id,
        diagnosis_result: header.diagnosis_result,
        total_medicine_amount: header.total_medicine_amount,
        total_action_amount: header.total_action_amount,
        total_amount: header.total_amount,
        payment_status: header.payment_status,
        medicine_details,
        action_details,
        created_at: header.created_at,
    })
}
