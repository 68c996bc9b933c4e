//! Presentation core: everything the dashboard shows, computed from a
//! (possibly filtered) provider table without touching the UI.

pub mod map;
pub mod metrics;
pub mod table;
