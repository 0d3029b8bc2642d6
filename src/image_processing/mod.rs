pub mod detection;
pub mod headshot;
pub mod normalize;
pub mod orientation;
pub mod segmentation;

pub use detection::{FaceBox, FaceDetector, ScriptFaceDetector};
pub use headshot::{analyze, HeadshotVerdict};
pub use normalize::{normalize, ResizePolicy};
pub use segmentation::{replace_background, PersonSegmenter, ScriptPersonSegmenter};
