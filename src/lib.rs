//! glucoscope: filtering, aggregation and diabetes-risk modelling over a
//! tabular health-record dataset.
//!
//! The crate is a pure pipeline. Load a [`Dataset`] once, then call
//! [`run`] with explicit [`FilterCriteria`] each time the selection
//! changes; every output is rebuilt from scratch.

pub mod analysis;
pub mod cli;
pub mod data;
pub mod error;
pub mod pipeline;
pub mod predict;

pub use data::filter::{apply as apply_filter, FilterCriteria, FilteredView};
pub use data::loader::load_file;
pub use data::model::{Dataset, DatasetSchema, GroupColumn, GroupKey, NumericColumn, Record};
pub use error::{AnalysisError, Result};
pub use pipeline::{run, PipelineConfig, PipelineOutput, StageOutcome};
pub use predict::{train_and_evaluate, ModelArtifact, ModelConfig};
