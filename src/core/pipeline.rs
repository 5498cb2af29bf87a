use crate::adapters::signature::{reference_file_name, SignatureResolver};
use crate::core::batch::{BatchOrchestrator, BatchRun, BatchSettings};
use crate::core::export::{write_csv, write_flat_rows_json, write_xlsx};
use crate::core::projector::project;
use crate::core::{BatchResult, ConfigProvider, ExtractionClient, FileHandle, Pipeline, Storage, TransformResult};
use crate::utils::error::{EtlError, Result};
use std::path::Path;

/// Uploads a batch, flattens the results and writes the export artifacts.
pub struct BatchPipeline<S: Storage, C: ConfigProvider, X: ExtractionClient> {
    storage: S,
    config: C,
    orchestrator: BatchOrchestrator<X>,
}

impl<S: Storage, C: ConfigProvider, X: ExtractionClient> BatchPipeline<S, C, X> {
    pub fn new(storage: S, config: C, client: X) -> Self {
        let settings = BatchSettings::from_config(&config);
        Self {
            storage,
            config,
            orchestrator: BatchOrchestrator::new(client, settings),
        }
    }

    pub fn orchestrator(&self) -> &BatchOrchestrator<X> {
        &self.orchestrator
    }

    pub fn config(&self) -> &C {
        &self.config
    }

    pub fn select_files(&self, files: Vec<FileHandle>) -> Result<u64> {
        self.orchestrator.select_files(files)
    }

    fn output_location(&self, file_name: &str) -> String {
        format!("{}/{}", self.config.output_path(), file_name)
    }

    fn sibling_name(&self, extension: &str) -> String {
        Path::new(self.config.export_filename())
            .with_extension(extension)
            .to_string_lossy()
            .into_owned()
    }

    async fn save_signatures(&self, result: &TransformResult) {
        let resolver = match SignatureResolver::new(self.config.service_endpoint()) {
            Ok(resolver) => resolver,
            Err(e) => {
                tracing::warn!("⚠️ Cannot resolve signature images: {}", e);
                return;
            }
        };

        for row in &result.flat_rows {
            for (path, value) in row.iter() {
                if !SignatureResolver::is_signature_ref(path, value) {
                    continue;
                }
                let Some(reference) = value else { continue };
                let Some(name) = reference_file_name(reference) else {
                    continue;
                };
                match resolver.fetch(reference).await {
                    Ok(bytes) => {
                        let target = format!("signatures/{}", name);
                        if let Err(e) = self.storage.write_file(&target, &bytes).await {
                            tracing::warn!("⚠️ Failed to store {}: {}", target, e);
                        } else {
                            tracing::debug!("Saved signature {}", target);
                        }
                    }
                    Err(e) => tracing::warn!("⚠️ Failed to fetch signature {}: {}", reference, e),
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl<S: Storage, C: ConfigProvider, X: ExtractionClient> Pipeline for BatchPipeline<S, C, X> {
    async fn extract(&self) -> Result<Vec<BatchResult>> {
        match self.orchestrator.run().await? {
            BatchRun::Completed { results, .. } => Ok(results),
            BatchRun::Superseded { generation } => Err(EtlError::BatchSuperseded { generation }),
        }
    }

    async fn transform(&self, results: Vec<BatchResult>) -> Result<TransformResult> {
        let mut file_names = Vec::with_capacity(results.len());
        let mut flat_rows = Vec::with_capacity(results.len());
        for result in results {
            if let Some(row) = result.row() {
                file_names.push(result.file_name.clone());
                flat_rows.push(row.clone());
            }
        }

        let table = project(&flat_rows);
        tracing::info!(
            "🔧 Projected {} file(s) onto {} column(s)",
            table.rows.len(),
            table.columns.len()
        );

        Ok(TransformResult {
            file_names,
            flat_rows,
            table,
        })
    }

    async fn load(&self, result: &TransformResult) -> Result<String> {
        let formats = self.config.export_formats();
        let mut primary = None;

        for format in formats {
            let (file_name, bytes) = match format.as_str() {
                "xlsx" => (self.config.export_filename().to_string(), write_xlsx(&result.table)?),
                "csv" => (self.sibling_name("csv"), write_csv(&result.table)?),
                "json" => (
                    self.sibling_name("json"),
                    write_flat_rows_json(&result.file_names, &result.flat_rows)?,
                ),
                other => {
                    return Err(EtlError::ConfigError {
                        message: format!("unsupported export format '{}'", other),
                    })
                }
            };

            tracing::debug!("Writing {} ({} bytes) to storage", file_name, bytes.len());
            self.storage.write_file(&file_name, &bytes).await?;
            tracing::info!("💾 Saved {}", self.output_location(&file_name));
            primary.get_or_insert(file_name);
        }

        if self.config.download_signatures() {
            self.save_signatures(result).await;
        }

        let primary = primary.ok_or_else(|| EtlError::ConfigError {
            message: "no export formats configured".to_string(),
        })?;
        Ok(self.output_location(&primary))
    }
}
