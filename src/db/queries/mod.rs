//! Database queries organized by domain

pub mod carer;
pub mod client;
pub mod travel;
pub mod visit;
