use crate::core::{Pipeline, TransformResult};
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;

/// What a finished run produced.
#[derive(Debug, Clone)]
pub struct EtlReport {
    pub output_path: String,
    pub result: TransformResult,
}

pub struct EtlEngine<P: Pipeline> {
    pipeline: P,
    monitor: SystemMonitor,
}

impl<P: Pipeline> EtlEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self::new_with_monitoring(pipeline, false)
    }

    pub fn new_with_monitoring(pipeline: P, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            monitor: SystemMonitor::new(monitor_enabled),
        }
    }

    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    pub async fn run(&self) -> Result<EtlReport> {
        tracing::info!("Starting extraction batch...");
        self.monitor.log_stats("start");

        let results = self.pipeline.extract().await?;
        tracing::info!("Extracted metadata from {} file(s)", results.len());
        self.monitor.log_stats("extract");

        let result = self.pipeline.transform(results).await?;
        tracing::info!(
            "Flattened {} file(s) into {} column(s)",
            result.flat_rows.len(),
            result.table.columns.len()
        );
        self.monitor.log_stats("transform");

        let output_path = self.pipeline.load(&result).await?;
        tracing::info!("Output saved to: {}", output_path);
        self.monitor.log_stats("load");
        self.monitor.log_final_stats();

        Ok(EtlReport {
            output_path,
            result,
        })
    }
}
