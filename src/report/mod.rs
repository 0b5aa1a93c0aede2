//! Report generation modules.
//!
//! Chart descriptions, file naming and the JSON summary live in
//! `generator`; drawing lives in `renderer`.

pub mod generator;
pub mod renderer;

pub use generator::*;
pub use renderer::*;
