use anyhow::Result;
use httpmock::prelude::*;
use ocr_etl::core::FileHandle;
use ocr_etl::utils::error::EtlError;
use ocr_etl::{BatchPipeline, CliConfig, EtlEngine, HttpExtractionClient, LocalStorage};
use std::io::Read;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write_pdf(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("%PDF-1.4 {}", name)).unwrap();
    path
}

fn cli_config(endpoint: String, output_path: &str, files: Vec<PathBuf>) -> CliConfig {
    CliConfig {
        files,
        endpoint,
        extract_path: "/api/ocr".to_string(),
        output_path: output_path.to_string(),
        export_filename: "metadata_output.xlsx".to_string(),
        formats: vec!["xlsx".to_string(), "csv".to_string()],
        timeout_seconds: 10,
        max_files: 10,
        allowed_extensions: vec!["pdf".to_string()],
        download_signatures: false,
        show: false,
        config: None,
        log_format: Default::default(),
        verbose: false,
        monitor: false,
        headers: None,
    }
}

fn read_zip_entry(path: &Path, name: &str) -> String {
    let data = std::fs::read(path).unwrap();
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(data)).unwrap();
    let mut entry = archive.by_name(name).unwrap();
    let mut content = String::new();
    entry.read_to_string(&mut content).unwrap();
    content
}

#[tokio::test]
async fn test_end_to_end_batch_export() -> Result<()> {
    let input_dir = TempDir::new()?;
    let output_dir = TempDir::new()?;
    let output_path = output_dir.path().to_str().unwrap().to_string();

    let server = MockServer::start();
    let first_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/api/ocr")
            .body_contains("filename=\"first.pdf\"");
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(serde_json::json!({
                "metadata": {
                    "Patient Name": "Jane Roe",
                    "Procedure": {"Name": "MRI", "Date": "2024-05-01"},
                    "Medications": ["aspirin", "ibuprofen"]
                },
                "patient_signature": "/signatures/first_patient.png",
                "physician_signature": "/signatures/first_physician.png"
            }));
    });
    let second_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/api/ocr")
            .body_contains("filename=\"second.pdf\"");
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(serde_json::json!({
                "metadata": {"Patient Name": "John Doe", "Insurance": {"Provider": "Acme"}},
                "patient_signature": null,
                "physician_signature": null
            }));
    });

    let files = vec![
        write_pdf(input_dir.path(), "first.pdf"),
        write_pdf(input_dir.path(), "second.pdf"),
    ];
    let config = cli_config(server.base_url(), &output_path, files.clone());
    let client = HttpExtractionClient::from_config(&config);
    let pipeline = BatchPipeline::new(LocalStorage::new(output_path.clone()), config, client);
    pipeline.select_files(files.iter().map(FileHandle::from_path).collect())?;

    let engine = EtlEngine::new(pipeline);
    let report = engine.run().await?;

    first_mock.assert();
    second_mock.assert();
    assert!(report.output_path.ends_with("metadata_output.xlsx"));
    assert!(engine.pipeline().orchestrator().state().is_ready());

    let table = &report.result.table;
    assert_eq!(
        table.columns,
        vec![
            "Patient Name",
            "Procedure.Name",
            "Procedure.Date",
            "Medications",
            "File Name",
            "Patient Signature",
            "Physician Signature",
            "Insurance.Provider",
        ]
    );
    assert_eq!(table.value(0, "Medications"), Some("aspirin; ibuprofen"));
    assert_eq!(table.value(1, "Procedure.Name"), Some(""));
    assert_eq!(table.value(1, "Insurance.Provider"), Some("Acme"));
    assert_eq!(table.value(1, "File Name"), Some("second.pdf"));

    let xlsx_path = output_dir.path().join("metadata_output.xlsx");
    assert!(xlsx_path.exists());
    let sheet = read_zip_entry(&xlsx_path, "xl/worksheets/sheet1.xml");
    assert!(sheet.contains(">Procedure.Name<"));
    assert!(sheet.contains(">Jane Roe<"));
    assert!(sheet.contains(">/signatures/first_patient.png<"));
    assert!(sheet.contains(r#"<row r="3">"#));

    let csv = std::fs::read_to_string(output_dir.path().join("metadata_output.csv"))?;
    assert!(csv.starts_with("Patient Name,Procedure.Name,Procedure.Date,Medications,File Name"));
    assert_eq!(csv.lines().count(), 3);

    Ok(())
}

#[tokio::test]
async fn test_failure_aborts_batch_and_writes_nothing() {
    let input_dir = TempDir::new().unwrap();
    let output_dir = TempDir::new().unwrap();
    let output_path = output_dir.path().to_str().unwrap().to_string();

    let server = MockServer::start();
    let ok_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/api/ocr")
            .body_contains("filename=\"doc1.pdf\"");
        then.status(200)
            .json_body(serde_json::json!({"metadata": {"Patient Name": "A"}}));
    });
    let failing_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/api/ocr")
            .body_contains("filename=\"doc2.pdf\"");
        then.status(500);
    });
    let never_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/api/ocr")
            .body_contains("filename=\"doc3.pdf\"");
        then.status(200).json_body(serde_json::json!({"metadata": {}}));
    });

    let files: Vec<PathBuf> = ["doc1.pdf", "doc2.pdf", "doc3.pdf"]
        .iter()
        .map(|name| write_pdf(input_dir.path(), name))
        .collect();
    let config = cli_config(server.base_url(), &output_path, files.clone());
    let client = HttpExtractionClient::from_config(&config);
    let pipeline = BatchPipeline::new(LocalStorage::new(output_path.clone()), config, client);
    pipeline
        .select_files(files.iter().map(FileHandle::from_path).collect())
        .unwrap();

    let engine = EtlEngine::new(pipeline);
    let err = engine.run().await.unwrap_err();

    match err {
        EtlError::SubmissionError { file, message } => {
            assert_eq!(file, "doc2.pdf");
            assert!(message.contains("500"));
        }
        other => panic!("expected a submission error, got {:?}", other),
    }
    ok_mock.assert_hits(1);
    failing_mock.assert_hits(1);
    never_mock.assert_hits(0);

    let state = engine.pipeline().orchestrator().state();
    assert!(state.results().is_none());
    assert_eq!(state.failure().unwrap().position, 2);
    assert!(!output_dir.path().join("metadata_output.xlsx").exists());
}

#[tokio::test]
async fn test_too_many_files_rejected_before_upload() {
    let input_dir = TempDir::new().unwrap();
    let output_dir = TempDir::new().unwrap();
    let output_path = output_dir.path().to_str().unwrap().to_string();

    let server = MockServer::start();
    let api_mock = server.mock(|when, then| {
        when.method(POST).path("/api/ocr");
        then.status(200).json_body(serde_json::json!({"metadata": {}}));
    });

    let files: Vec<PathBuf> = (1..=11)
        .map(|i| write_pdf(input_dir.path(), &format!("doc{}.pdf", i)))
        .collect();
    let config = cli_config(server.base_url(), &output_path, files.clone());
    let client = HttpExtractionClient::from_config(&config);
    let pipeline = BatchPipeline::new(LocalStorage::new(output_path), config, client);

    let err = pipeline
        .select_files(files.iter().map(FileHandle::from_path).collect())
        .unwrap_err();

    assert!(matches!(err, EtlError::ValidationError { .. }));
    api_mock.assert_hits(0);
}
