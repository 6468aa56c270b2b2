//! Data models for plate-gen

pub mod artifact;
pub mod generation_job;
pub mod section_image;

pub use artifact::{validate_sections, Artifact, Section};
pub use generation_job::{JobOutcome, JobState};
pub use section_image::{image_cost, ImageSize, QualityTier, SectionImageRecord};
