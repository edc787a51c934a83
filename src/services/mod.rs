pub mod conflict;
pub mod geo;
pub mod grouping;
pub mod optimizer;
pub mod rota;
pub mod travel_cache;
