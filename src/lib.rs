pub mod cache;
pub mod chunker;
pub mod collaborator;
pub mod components;
pub mod config;
pub mod error;
pub mod extractor;
pub mod fallback;
pub mod filter;
pub mod ordering;
pub mod pipeline;
pub mod preprocess;

pub use collaborator::{ContentCollaborator, OpenAiCollaborator};
pub use components::{ComponentCandidate, ComponentKind, NormalizedComponent};
pub use config::Config;
pub use error::{ExtractionError, PipelineError};
pub use filter::{FilteringOptions, Strictness};
pub use ordering::OrderingMode;
pub use pipeline::{MicrositePipeline, ParseRequest, PipelineOutput, StructuredResponse};
