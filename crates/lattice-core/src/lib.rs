//! lattice-core — shared value types for the lattice constraint tooling.
//!
//! - **`score`** — symbolic-infinity constraint scores
//! - **`types`** — resource keys, constraint kinds, endpoint pairs
//! - **`params`** — parameter metadata (defaults, validators, choices)
//! - **`config`** — `lattice.toml` configuration

pub mod config;
pub mod error;
pub mod params;
pub mod score;
pub mod types;

pub use config::LatticeConfig;
pub use error::{CoreError, CoreResult};
pub use params::{AccessType, ParamCatalog, ParamMeta, ParamProvider, ParamType};
pub use score::{SCORE_INFINITY, Score};
pub use types::*;
