//! Outer surfaces: CSV scripts in, link balances out.

pub mod batch;
pub mod csv;
