//! Image moderation: the classifier seam and the strike/ban policy applied
//! to new posts and avatars.

pub mod classifier;
pub mod policy;

pub use classifier::{Detections, ImageClassifier, RemoteClassifier};
pub use policy::{BanReason, DETECTION_THRESHOLD, MAX_STRIKES, PostDecision, Verdict, decide_post};
