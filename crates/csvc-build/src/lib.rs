//! Build orchestration for the container build service
//!
//! This crate drives one image build end to end: it writes the build spec
//! into the source tree, packages the tree, submits it to the engine,
//! renders the engine's progress feed and records build metrics.

pub mod error;
pub mod exporter;
pub mod metrics;
pub mod orchestrator;
pub mod render;

pub use error::{BuildError, Result};
pub use exporter::MetricsExporter;
pub use metrics::{BuildMetrics, MetricsRecorder, MetricsSnapshot, NoopMetrics};
pub use orchestrator::{BuildFailure, BuildOrchestrator, BuildReport, BUILD_COMPLETE_MESSAGE};
pub use render::{
    render_record, EventRenderer, EventSink, SharedBuffer, SpinnerSink, StdoutSink, TracingSink,
};
