//! Tabular input/output helpers.

pub(crate) mod csv;
