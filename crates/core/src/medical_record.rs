//! Medical record domain types.
//!
//! A [`MedicalRecord`] is a bill header owning two ordered collections of line items. Line
//! items carry the catalog name and price *as they were when the record was created*; the
//! optional `current` views hold the live catalog values and are only filled in by read paths.

use crate::{ClinicError, ClinicResult, Quantity};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// One medicine requested on a new record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MedicineOrder {
    pub medicine_id: Uuid,
    pub quantity: Quantity,
}

/// Everything needed to create a medical record.
#[derive(Clone, Debug)]
pub struct NewMedicalRecord {
    pub booking_id: Uuid,
    pub diagnosis_result: String,
    pub payment_status: bool,
    pub medicines: Vec<MedicineOrder>,
    pub actions: Vec<Uuid>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MedicalRecord {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub diagnosis_result: String,
    pub total_medicine_amount: i64,
    pub total_action_amount: i64,
    pub total_amount: i64,
    pub payment_status: bool,
    pub medicine_details: Vec<MedicineLineItem>,
    pub action_details: Vec<ActionLineItem>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MedicineLineItem {
    pub id: Uuid,
    pub medical_record_id: Uuid,
    pub medicine_id: Uuid,
    pub medicine_name: String,
    pub unit_price: i64,
    pub quantity: Quantity,
    /// Catalog stock left after this line was dispensed. `None` while the record is unpaid.
    pub stock_after: Option<i64>,
    pub current: Option<CurrentMedicine>,
}

impl MedicineLineItem {
    pub fn line_total(&self) -> ClinicResult<i64> {
        line_amount(self.unit_price, self.quantity)
    }
}

/// Live catalog view of a medicine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CurrentMedicine {
    pub name: String,
    pub price: i64,
    pub stock: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ActionLineItem {
    pub id: Uuid,
    pub medical_record_id: Uuid,
    pub action_id: Uuid,
    pub action_name: String,
    pub action_price: i64,
    pub action_description: Option<String>,
    pub current: Option<CurrentAction>,
}

/// Live catalog view of an action.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CurrentAction {
    pub name: String,
    pub price: i64,
    pub description: Option<String>,
    pub retired: bool,
}

/// Running totals for a record, accumulated in line order with checked arithmetic.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Totals {
    pub medicine: i64,
    pub action: i64,
}

impl Totals {
    pub fn add_medicine(&mut self, unit_price: i64, quantity: Quantity) -> ClinicResult<()> {
        let line = line_amount(unit_price, quantity)?;
        self.medicine = self
            .medicine
            .checked_add(line)
            .ok_or(ClinicError::AmountOverflow)?;
        Ok(())
    }

    pub fn add_action(&mut self, price: i64) -> ClinicResult<()> {
        self.action = self
            .action
            .checked_add(price)
            .ok_or(ClinicError::AmountOverflow)?;
        Ok(())
    }

    pub fn total(&self) -> ClinicResult<i64> {
        self.medicine
            .checked_add(self.action)
            .ok_or(ClinicError::AmountOverflow)
    }
}

fn line_amount(unit_price: i64, quantity: Quantity) -> ClinicResult<i64> {
    unit_price
        .checked_mul(quantity.as_i64())
        .ok_or(ClinicError::AmountOverflow)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn qty(n: i64) -> Quantity {
        Quantity::new(n).unwrap()
    }

    #[test]
    fn totals_accumulate_medicines_and_actions() {
        let mut totals = Totals::default();
        totals.add_medicine(1_500, qty(2)).unwrap();
        totals.add_medicine(250, qty(4)).unwrap();
        totals.add_action(5_000).unwrap();

        assert_eq!(totals.medicine, 4_000);
        assert_eq!(totals.action, 5_000);
        assert_eq!(totals.total().unwrap(), 9_000);
    }

    #[test]
    fn totals_report_overflow_instead_of_wrapping() {
        let mut totals = Totals::default();
        let err = totals
            .add_medicine(i64::MAX, qty(2))
            .expect_err("multiplication should overflow");
        assert!(matches!(err, ClinicError::AmountOverflow));

        let mut totals = Totals {
            medicine: i64::MAX,
            action: 1,
        };
        assert!(matches!(totals.total(), Err(ClinicError::AmountOverflow)));
        assert!(matches!(
            totals.add_action(i64::MAX),
            Err(ClinicError::AmountOverflow)
        ));
    }
}
