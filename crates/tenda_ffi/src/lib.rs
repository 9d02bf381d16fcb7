//! Flutter-facing bridge over `tenda_core`.

pub mod api;
