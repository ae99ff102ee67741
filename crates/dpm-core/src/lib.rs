//! DPM Core: Domain models, role model, authorization engine and
//! repository contracts for the DDS permissions manager.

pub mod authz;
pub mod error;
pub mod events;
pub mod models;
pub mod repository;
