//! lattice-synth — renders graph and parameter state as configuration text.
//!
//! Two output formats:
//!
//! - **Replicated-volume resource blocks** (`resource r0 { … on host { … } }`)
//!   with default suppression, per-host volume sub-blocks and resolved
//!   `address ip:port;` lines.
//! - **Constraint definitions**: the non-default attribute map of an order
//!   or colocation edge, and its one-line shell form.
//!
//! Both renderers iterate in declaration or key order only, so rendering
//! unchanged state twice yields byte-identical text.

pub mod constraint;
pub mod error;
pub mod network;
pub mod ports;
pub mod synthesizer;
pub mod volume;

pub use error::{SynthError, SynthResult};
pub use network::{HostDirectory, StaticHosts};
pub use ports::PortAllocator;
pub use synthesizer::{Catalogs, ConfigSynthesizer};
pub use volume::{HostSection, VolumeResource, VolumeSpec};
