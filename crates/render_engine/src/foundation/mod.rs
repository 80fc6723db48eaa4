//! Foundation utilities shared by every layer of the renderer

pub mod logging;
pub mod math;
