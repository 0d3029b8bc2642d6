// Library exports for reuse by capture front-ends and other applications
pub mod cli;
pub mod config_file;
pub mod export;
pub mod image_processing;
pub mod json_output;
pub mod session;
pub mod storage;
pub mod utils;

// Re-export commonly used types
pub use cli::{Args, ResizeMode};
pub use image_processing::{
    analyze, normalize, FaceBox, FaceDetector, HeadshotVerdict, PersonSegmenter, ResizePolicy,
};
pub use json_output::JsonMessage;
pub use session::{ExportOutcome, Session, SessionConfig, SessionState};
pub use storage::PhotoStore;
