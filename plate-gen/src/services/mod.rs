//! Services for plate-gen
//!
//! Leaf adapters (image provider, object store, section source) and the
//! orchestration built on them.

pub mod artifact_source;
pub mod generation_orchestrator;
pub mod image_provider;
pub mod job_registry;
pub mod object_store;
pub mod prompt;

pub use artifact_source::{ArtifactSource, SqliteArtifactSource};
pub use generation_orchestrator::{GenerationOrchestrator, OrchestratorSettings};
pub use image_provider::{GeneratedImage, ImageProvider, ImageRequest, OpenAiImageProvider, ProviderError};
pub use job_registry::{JobRecord, JobRegistry, RegistryError};
pub use object_store::{HttpObjectStore, LocalObjectStore, ObjectStore, StorageError};
