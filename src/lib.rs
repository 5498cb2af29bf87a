pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::{cli::LocalStorage, toml_config::TomlConfig};

pub use adapters::{HttpExtractionClient, SignatureResolver};
pub use core::{
    batch::{BatchOrchestrator, BatchRun, BatchSettings, BatchState},
    etl::{EtlEngine, EtlReport},
    flatten::flatten,
    pipeline::BatchPipeline,
    projector::project,
};
pub use utils::error::{EtlError, Result};
