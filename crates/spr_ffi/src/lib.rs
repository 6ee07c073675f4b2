//! Host bridge over `spr_core`.

pub mod api;
