//! Type definitions

pub mod carer;
pub mod client;
pub mod messages;
pub mod rota;
pub mod travel;
pub mod visit;

pub use carer::*;
pub use client::*;
pub use messages::*;
pub use rota::*;
pub use travel::*;
pub use visit::*;
