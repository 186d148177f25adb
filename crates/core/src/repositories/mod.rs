//! Persistence and use-case modules.
//!
//! `catalog` and `ledger` are the two stores sharing one database; `medical_records` is the
//! ledger service that orchestrates them inside a transaction.

pub mod catalog;
pub mod ledger;
pub mod medical_records;
