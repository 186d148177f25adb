//! # Clinic Core
//!
//! Core business logic for the clinic billing backend.
//!
//! This crate contains the medical record ledger and the stores it depends on:
//! - Catalog of medicines (price, stock) and billable actions (price, description)
//! - Ledger of medical record headers with medicine and action line items
//! - Transactional record creation with price snapshots, stock dispensing and totals
//!
//! **No API concerns**: authentication, HTTP servers, and JSON request shapes belong in
//! `api-rest` or `api-shared`.

pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod medical_record;
pub mod repositories;

pub use clinic_types::{NonEmptyText, Quantity, QuantityError, TextError};
pub use config::CoreConfig;
pub use error::{ClinicError, ClinicResult};
pub use medical_record::{
    ActionLineItem, CurrentAction, CurrentMedicine, MedicalRecord, MedicineLineItem,
    MedicineOrder, NewMedicalRecord,
};
pub use repositories::catalog::{Action, CatalogService, Medicine, NewAction, NewMedicine};
pub use repositories::medical_records::MedicalRecordService;
