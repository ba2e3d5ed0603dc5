//! facesort-core - Photo auto-clustering and roster-matching engine.
//!
//! facesort takes a directory of event photographs and sorts them into
//! per-subject folders using an external vision backend, either by clustering
//! photos of the same subject together on the fly or by matching each photo
//! against a pre-registered roster of known subjects.
//!
//! # Architecture
//!
//! ```text
//! Discover → Decode → Timestamp → Vision RPC → Cluster/Match → Plan → Execute → Report
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use facesort_core::{Config, Engine, RunOptions};
//!
//! #[tokio::main]
//! async fn main() -> facesort_core::Result<()> {
//!     let config = Config::load()?;
//!     let engine = Engine::new(config).await?;
//!     let (summary, _placements) = engine
//!         .run_auto_cluster(
//!             std::path::Path::new("./photos"),
//!             std::path::Path::new("./sorted"),
//!             &RunOptions::default(),
//!         )
//!         .await?;
//!     println!("placed {} photos", summary.placements_succeeded);
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod clusterer;
pub mod config;
pub mod engine;
pub mod error;
pub mod executor;
pub(crate) mod matcher;
pub(crate) mod pipeline;
pub(crate) mod planner;
pub mod reporter;
pub mod roster;
pub mod types;
pub mod vision;

pub use config::Config;
pub use engine::{Engine, RunOptions};
pub use error::{ConfigError, EngineError, PipelineError, PipelineResult, Result, VisionError};
pub use executor::{undo, ExecutionResult};
pub use pipeline::{EncodedPayload, MetadataExtractor};
pub use types::{
    Category, Cluster, ClusterMember, Image, ImageAnalysis, Manifest, ManifestEntry, Placement,
    RosterEntry, RunMode, RunSummary, SubjectDetection,
};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
