pub mod batch;
pub mod etl;
pub mod export;
pub mod flatten;
pub mod pipeline;
pub mod projector;
pub mod report;

pub use crate::domain::model::{
    BatchFailure, BatchResult, ExportTable, Extraction, ExtractionOutcome, FileHandle, FlatRow,
    MetadataRecord, MetadataValue, SignatureRefs, TransformResult,
};
pub use crate::domain::ports::{ConfigProvider, ExtractionClient, Pipeline, Storage};
pub use crate::utils::error::Result;
