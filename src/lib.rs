pub mod config;
pub mod matcher;
pub mod pipeline;
pub mod session;
pub mod store;
pub mod types;

pub use config::PipelineConfig;
pub use matcher::{MatchOutcome, Matcher};
pub use pipeline::{FeatureExtractor, FeatureVector, FrameSource, HandPipeline};
pub use session::{SessionCommand, SessionController, SessionEvent, StopReason};
pub use store::GestureStore;
pub use types::{Frame, FrameResult};
