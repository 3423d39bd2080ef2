pub mod config;
pub mod downloader;
pub mod error;
pub mod http;
pub mod installer;
pub mod pipeline;
pub mod registry;

pub use config::{BearerCredential, ConfigStore, GravityConfig};
pub use downloader::Downloader;
pub use error::{GravityError, Result};
pub use http::{HttpClient, HttpClientConfig, HttpError};
pub use installer::{ArchiveExtractor, ArchiveInstaller};
pub use pipeline::{InstallRequest, Installed, Pipeline, PipelineEvent, Stage};
pub use registry::{Registry, RegistryError, RegistryMetadata, ResolvedPackage};
