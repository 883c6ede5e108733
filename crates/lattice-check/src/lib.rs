//! lattice-check — validation and diff of editable parameters.
//!
//! ```text
//!   FieldSource ──live/saved──▶ FieldCheckEngine ──▶ Check
//!                                 │   ▲                ├─ incorrect
//!   ParamProvider ──meta─────────▶│   │                └─ changed (old → new)
//!                                 ▼   │
//!                          validity cache (per field)
//! ```
//!
//! A field is *incorrect* when it fails required, type, regexp,
//! strict-choice or registered business-rule validation, and *changed*
//! when its live value differs from the saved one. Commit actions are
//! enabled only by a report with no incorrect fields and at least one
//! change.

pub mod check;
pub mod engine;
pub mod source;

pub use check::{Check, FieldChange, Violation};
pub use engine::{FieldCheckEngine, Rule};
pub use source::{FieldSource, FieldValues};
