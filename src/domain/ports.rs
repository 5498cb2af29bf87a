use crate::domain::model::{BatchResult, Extraction, FileHandle, TransformResult};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn service_endpoint(&self) -> &str;
    fn extract_path(&self) -> &str;
    fn request_headers(&self) -> Option<&HashMap<String, String>>;
    fn submit_timeout(&self) -> Duration;
    fn max_files(&self) -> usize;
    fn allowed_extensions(&self) -> &[String];
    fn output_path(&self) -> &str;
    fn export_filename(&self) -> &str;
    fn export_formats(&self) -> &[String];
    fn download_signatures(&self) -> bool;
}

/// The remote service turning one document into metadata.
#[async_trait]
pub trait ExtractionClient: Send + Sync {
    async fn submit(&self, file: &FileHandle) -> Result<Extraction>;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<Vec<BatchResult>>;
    async fn transform(&self, results: Vec<BatchResult>) -> Result<TransformResult>;
    async fn load(&self, result: &TransformResult) -> Result<String>;
}
