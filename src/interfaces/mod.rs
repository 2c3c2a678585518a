pub mod csv;
pub mod query;
