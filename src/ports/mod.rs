//! Port traits at the IO seams.

pub mod config_port;
pub mod price_port;
