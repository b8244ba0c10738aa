//! Catalog domain module
//!
//! Products and their variant stock counters. Catalog CRUD lives elsewhere;
//! the order core only reads products and reserves/returns variant stock.

mod model;

pub use model::*;
