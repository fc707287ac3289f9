//! Pipeline definition, stage execution, and sequencing

pub mod facets;
pub mod report;
pub mod sequencer;
pub mod spec;
pub mod stage;

pub use sequencer::{PipelineRun, RunState, Sequencer};
pub use spec::{PipelineSpec, StageSpec, StepSpec, DEFAULT_PIPELINE_FILE};
pub use stage::{StageContext, StageFailure, StageOutcome, StageState};
