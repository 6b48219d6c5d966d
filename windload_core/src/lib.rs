//! # windload_core - Wind Load Generation Engine
//!
//! `windload_core` turns wind load case tables into beam line loads and
//! merges them safely into a per-element load store. All inputs and outputs
//! are JSON-serializable, so a run can be previewed, saved, edited and
//! applied later.
//!
//! ## Design Philosophy
//!
//! - **Preview first**: component and plan building never write anywhere
//! - **Safe merge**: records of untouched load cases survive every apply
//! - **Rich Errors**: structured error types, not just strings
//! - **Soft gaps**: unresolved sections or pressures are reported, not fatal
//!
//! ## Quick Start
//!
//! ```rust
//! use windload_core::coefficients::{CoefficientTable, DEFAULT_CONTROL_ANGLES};
//! use windload_core::loads::{CaseDefinition, LoadFamily};
//! use windload_core::model::ModelSnapshot;
//! use windload_core::pipeline::{FamilyTables, GroupTarget, WindLoadGenerator, WindTables};
//! use windload_core::store::MemoryStore;
//! use windload_core::WindLoadConfig;
//!
//! let model = ModelSnapshot::new()
//!     .with_element(1, 10)
//!     .with_group("Deck", &[1]);
//!
//! let coefficients = CoefficientTable::from_values(
//!     &[0, 15, 30, 45, 60],
//!     &[0.10, 0.12, 0.14, 0.16, 0.18],
//!     &[0.00, 0.02, 0.04, 0.06, 0.08],
//!     &DEFAULT_CONTROL_ANGLES,
//! )?;
//! let tables = WindTables::new().with_family(
//!     LoadFamily::LiveWind,
//!     FamilyTables {
//!         cases: vec![CaseDefinition::new("WL", 0, "WL_A0_Q1")],
//!         coefficients: Some(coefficients),
//!     },
//! );
//!
//! let generator = WindLoadGenerator::new(&model, &model, WindLoadConfig::default());
//! let targets = [GroupTarget::new("Deck", LoadFamily::LiveWind)];
//!
//! let preview = generator.build_plan(&targets, &tables)?;
//! assert_eq!(preview.rows.len(), 1);
//!
//! let mut store = MemoryStore::new();
//! let summary = generator.generate_and_apply(&mut store, &targets, &tables)?;
//! assert_eq!(summary.rows_sent, 1);
//! # Ok::<(), windload_core::LoadError>(())
//! ```
//!
//! ## Modules
//!
//! - [`coefficients`] - Control-angle coefficient tables
//! - [`quadrant`] - Quadrant sign convention shared by all families
//! - [`exposure`] - Section exposure depths per element
//! - [`loads`] - Components, plan rows and load families
//! - [`apply`] - Merging plans into a load store
//! - [`pipeline`] - End-to-end runs over structural groups
//! - [`store`] - Load store trait plus memory and JSON file stores
//! - [`config`] - Versioned run settings
//! - [`debug`] - Debug artifact sinks
//! - [`errors`] - Structured error types
//! - [`file_io`] - Atomic JSON files and advisory locks

pub mod apply;
pub mod coefficients;
pub mod config;
pub mod debug;
pub mod errors;
pub mod exposure;
pub mod file_io;
pub mod loads;
pub mod model;
pub mod pipeline;
pub mod quadrant;
pub mod store;
pub mod summary;
pub mod table;

// Re-export commonly used types at crate root for convenience
pub use apply::{ApplyOptions, ApplyReport, ApplyState, PlanApplier};
pub use config::{load_config, save_config, WindLoadConfig};
pub use errors::{LoadError, LoadResult};
pub use pipeline::{GroupTarget, WindLoadGenerator, WindTables};
pub use summary::RunSummary;
