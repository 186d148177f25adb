//! JSON request and response bodies with OpenAPI schemas.
//!
//! These mirror the core domain types but stay decoupled from them: requests are validated
//! into core types with [`CreateMedicalRecordReq::into_new_record`], and responses are built
//! from core types with `From`.

use chrono::{DateTime, Utc};
use clinic_core::{
    ActionLineItem, ClinicError, ClinicResult, MedicalRecord, MedicineLineItem, MedicineOrder,
    NewMedicalRecord, NonEmptyText, Quantity,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct MedicineOrderReq {
    pub medicine_id: Uuid,
    /// Units to dispense; must be at least 1.
    pub quantity: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ActionRefReq {
    pub action_id: Uuid,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateMedicalRecordReq {
    pub booking_id: Uuid,
    pub diagnosis_result: String,
    #[serde(default)]
    pub payment_status: bool,
    #[serde(default)]
    pub medicines: Vec<MedicineOrderReq>,
    #[serde(default)]
    pub actions: Vec<ActionRefReq>,
}

impl CreateMedicalRecordReq {
    /// Validates the request and converts it into the core creation input.
    ///
    /// # Errors
    ///
    /// Returns `ClinicError::InvalidInput` if the diagnosis is blank or any quantity is not
    /// positive.
    pub fn into_new_record(self) -> ClinicResult<NewMedicalRecord> {
        let diagnosis_result = NonEmptyText::new(&self.diagnosis_result)
            .map_err(|_| ClinicError::InvalidInput("diagnosis_result cannot be empty".into()))?;

        let medicines = self
            .medicines
            .into_iter()
            .enumerate()
            .map(|(i, m)| {
                let quantity = Quantity::new(m.quantity).map_err(|e| {
                    ClinicError::InvalidInput(format!("medicines[{i}].quantity: {e}"))
                })?;
                Ok(MedicineOrder {
                    medicine_id: m.medicine_id,
                    quantity,
                })
            })
            .collect::<ClinicResult<Vec<_>>>()?;

        Ok(NewMedicalRecord {
            booking_id: self.booking_id,
            diagnosis_result: diagnosis_result.into_inner(),
            payment_status: self.payment_status,
            medicines,
            actions: self.actions.into_iter().map(|a| a.action_id).collect(),
        })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct CurrentMedicineRes {
    pub name: String,
    pub price: i64,
    pub stock: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct MedicineLineRes {
    pub id: Uuid,
    pub medical_record_id: Uuid,
    pub medicine_id: Uuid,
    pub medicine_name: String,
    /// Price frozen when the record was created.
    pub unit_price: i64,
    pub quantity: u32,
    pub stock_after: Option<i64>,
    /// Live catalog values; absent on the creation response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<CurrentMedicineRes>,
}

impl From<MedicineLineItem> for MedicineLineRes {
    fn from(line: MedicineLineItem) -> Self {
        Self {
            id: line.id,
            medical_record_id: line.medical_record_id,
            medicine_id: line.medicine_id,
            medicine_name: line.medicine_name,
            unit_price: line.unit_price,
            quantity: line.quantity.get(),
            stock_after: line.stock_after,
            current: line.current.map(|c| CurrentMedicineRes {
                name: c.name,
                price: c.price,
                stock: c.stock,
            }),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct CurrentActionRes {
    pub name: String,
    pub price: i64,
    pub description: Option<String>,
    pub retired: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ActionLineRes {
    pub id: Uuid,
    pub medical_record_id: Uuid,
    pub action_id: Uuid,
    pub action_name: String,
    pub action_price: i64,
    pub action_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<CurrentActionRes>,
}

impl From<ActionLineItem> for ActionLineRes {
    fn from(line: ActionLineItem) -> Self {
        Self {
            id: line.id,
            medical_record_id: line.medical_record_id,
            action_id: line.action_id,
            action_name: line.action_name,
            action_price: line.action_price,
            action_description: line.action_description,
            current: line.current.map(|c| CurrentActionRes {
                name: c.name,
                price: c.price,
                description: c.description,
                retired: c.retired,
            }),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct MedicalRecordRes {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub diagnosis_result: String,
    pub total_medicine_amount: i64,
    pub total_action_amount: i64,
    pub total_amount: i64,
    pub payment_status: bool,
    pub medicine_details: Vec<MedicineLineRes>,
    pub action_details: Vec<ActionLineRes>,
    pub created_at: DateTime<Utc>,
}

impl From<MedicalRecord> for MedicalRecordRes {
    fn from(record: MedicalRecord) -> Self {
        Self {
            id: record.id,
            booking_id: record.booking_id,
            diagnosis_result: record.diagnosis_result,
            total_medicine_amount: record.total_medicine_amount,
            total_action_amount: record.total_action_amount,
            total_amount: record.total_amount,
            payment_status: record.payment_status,
            medicine_details: record.medicine_details.into_iter().map(Into::into).collect(),
            action_details: record.action_details.into_iter().map(Into::into).collect(),
            created_at: record.created_at,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ListMedicalRecordsRes {
    pub medical_records: Vec<MedicalRecordRes>,
}
