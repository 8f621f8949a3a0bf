//! Packaging design optimization engine.
//!
//! Turns a finished product mesh and business constraints into a fitted box,
//! a material choice, an internal support structure and a label layout.
//!
//! ```no_run
//! use wrap_it_now::catalog::Catalogs;
//! use wrap_it_now::design::{DesignEngine, DesignRequest};
//! use wrap_it_now::optimizer::EngineConfig;
//! use wrap_it_now::shape::MeshInput;
//!
//! let engine = DesignEngine::new(Catalogs::builtin()?, EngineConfig::default());
//! let mesh = MeshInput::point_cloud(vec![
//!     [0.0, 0.0, 0.0], [120.0, 0.0, 0.0], [0.0, 80.0, 0.0], [120.0, 80.0, 0.0],
//!     [0.0, 0.0, 40.0], [120.0, 0.0, 40.0], [0.0, 80.0, 40.0], [120.0, 80.0, 40.0],
//! ]);
//! let outcome = engine.design(&DesignRequest::new(mesh))?;
//! println!("{} in {}", outcome.candidate.template_id(), outcome.candidate.material_id());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod api;
pub mod catalog;
pub mod config;
pub mod design;
pub mod error;
pub mod geometry;
pub mod labels;
pub mod model;
pub mod optimizer;
pub mod regulatory;
pub mod selector;
pub mod shape;
pub mod support;
pub mod template;
pub mod types;

pub use design::{DesignCandidate, DesignEngine, DesignEvent, DesignOutcome, DesignRequest};
pub use error::{DesignError, DesignResult};
