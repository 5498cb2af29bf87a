pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
pub use args::CliConfig;

#[cfg(feature = "cli")]
mod args {
    use crate::adapters::http::DEFAULT_EXTRACT_PATH;
    use crate::core::batch::MAX_BATCH_FILES;
    use crate::core::export::DEFAULT_EXPORT_FILENAME;
    use crate::core::ConfigProvider;
    use crate::utils::error::Result;
    use crate::utils::logger::LogFormat;
    use crate::utils::validation::{self, Validate};
    use clap::Parser;
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::time::Duration;

    #[derive(Debug, Clone, Parser)]
    #[command(name = "ocr-etl")]
    #[command(about = "Upload documents for OCR metadata extraction and export the results as a spreadsheet")]
    pub struct CliConfig {
        /// Documents to upload (at most 10 per batch)
        #[arg(required = true)]
        pub files: Vec<PathBuf>,

        /// Base URL of the extraction service
        #[arg(long, default_value = "http://localhost:5000")]
        pub endpoint: String,

        #[arg(long, default_value = DEFAULT_EXTRACT_PATH)]
        pub extract_path: String,

        #[arg(long, default_value = "./output")]
        pub output_path: String,

        #[arg(long, default_value = DEFAULT_EXPORT_FILENAME)]
        pub export_filename: String,

        /// Export formats: xlsx, csv, json
        #[arg(long, value_delimiter = ',', default_value = "xlsx")]
        pub formats: Vec<String>,

        /// Per-file submission timeout in seconds
        #[arg(long, default_value = "120")]
        pub timeout_seconds: u64,

        #[arg(long, default_value_t = MAX_BATCH_FILES)]
        pub max_files: usize,

        #[arg(long, value_delimiter = ',', default_value = "pdf")]
        pub allowed_extensions: Vec<String>,

        /// Save signature images next to the export
        #[arg(long)]
        pub download_signatures: bool,

        /// Print every file's extracted fields
        #[arg(long)]
        pub show: bool,

        /// TOML configuration file; command-line files are still used
        #[arg(short, long)]
        pub config: Option<PathBuf>,

        #[arg(long, value_enum, default_value = "compact")]
        pub log_format: LogFormat,

        #[arg(long, help = "Enable verbose output")]
        pub verbose: bool,

        #[arg(long, help = "Log process statistics per stage")]
        pub monitor: bool,

        #[arg(skip)]
        pub headers: Option<HashMap<String, String>>,
    }

    impl ConfigProvider for CliConfig {
        fn service_endpoint(&self) -> &str {
            &self.endpoint
        }

        fn extract_path(&self) -> &str {
            &self.extract_path
        }

        fn request_headers(&self) -> Option<&HashMap<String, String>> {
            self.headers.as_ref()
        }

        fn submit_timeout(&self) -> Duration {
            Duration::from_secs(self.timeout_seconds)
        }

        fn max_files(&self) -> usize {
            self.max_files
        }

        fn allowed_extensions(&self) -> &[String] {
            &self.allowed_extensions
        }

        fn output_path(&self) -> &str {
            &self.output_path
        }

        fn export_filename(&self) -> &str {
            &self.export_filename
        }

        fn export_formats(&self) -> &[String] {
            &self.formats
        }

        fn download_signatures(&self) -> bool {
            self.download_signatures
        }
    }

    impl Validate for CliConfig {
        fn validate(&self) -> Result<()> {
            validation::validate_url("endpoint", &self.endpoint)?;
            validation::validate_extract_path("extract_path", &self.extract_path)?;
            validation::validate_path("output_path", &self.output_path)?;
            validation::validate_non_empty_string("export_filename", &self.export_filename)?;
            validation::validate_export_formats("formats", &self.formats)?;
            validation::validate_range("max_files", self.max_files, 1, MAX_BATCH_FILES)?;
            validation::validate_range("timeout_seconds", self.timeout_seconds, 1, 3600)?;
            Ok(())
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_defaults() {
            let config = CliConfig::parse_from(["ocr-etl", "a.pdf", "b.pdf"]);

            assert_eq!(config.files.len(), 2);
            assert_eq!(config.service_endpoint(), "http://localhost:5000");
            assert_eq!(config.extract_path(), "/api/ocr");
            assert_eq!(config.export_filename(), "metadata_output.xlsx");
            assert_eq!(config.export_formats(), &["xlsx".to_string()]);
            assert_eq!(config.max_files(), 10);
            assert_eq!(config.submit_timeout(), Duration::from_secs(120));
            assert!(config.validate().is_ok());
        }

        #[test]
        fn test_invalid_values_fail_validation() {
            let config = CliConfig::parse_from(["ocr-etl", "a.pdf", "--max-files", "11"]);
            assert!(config.validate().is_err());

            let config = CliConfig::parse_from(["ocr-etl", "a.pdf", "--formats", "xlsx,pptx"]);
            assert!(config.validate().is_err());

            let config = CliConfig::parse_from(["ocr-etl", "a.pdf", "--endpoint", "ocr-host"]);
            assert!(config.validate().is_err());
        }
    }
}
