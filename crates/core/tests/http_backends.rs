use rag_jobs_core::{
    ClientConfig, ClientError, DirectProcessor, DocumentCatalog, DocumentCategory, HttpDirectProcessor,
    HttpJobBroker, JobBroker, JobId, PdfUpload, StatusProbe, TreatmentId, UploadReceipt,
};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_json, body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn broker(server: &MockServer) -> HttpJobBroker {
    HttpJobBroker::new(&format!("{}/api", server.uri()), &ClientConfig::default())
        .expect("broker url is valid")
}

fn direct(server: &MockServer) -> HttpDirectProcessor {
    HttpDirectProcessor::new(&server.uri(), &ClientConfig::default()).expect("direct url is valid")
}

fn sample_pdf() -> PdfUpload {
    PdfUpload::new("report.pdf", b"%PDF-1.4\nfake".to_vec())
}

#[tokio::test]
async fn question_submission_posts_broker_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/rag/analyze"))
        .and(body_json(json!({"Question": "x", "RequestTreatmentId": "CASE-1"})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"QueryId": "Q1", "RequestTreatmentId": "CASE-1"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let treatment = TreatmentId::parse("CASE-1");
    let queued = broker(&server)
        .submit_question("x", treatment.as_ref())
        .await
        .expect("submission ok");

    assert_eq!(queued.job_id, JobId::new("Q1"));
    assert_eq!(queued.treatment_id, treatment);
}

#[tokio::test]
async fn question_submission_without_hint_omits_treatment() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/rag/analyze"))
        .and(body_json(json!({"Question": "x"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"QueryId": "Q1"})))
        .expect(1)
        .mount(&server)
        .await;

    let queued = broker(&server).submit_question("x", None).await.expect("submission ok");
    assert_eq!(queued.treatment_id, None);
}

#[tokio::test]
async fn submission_failure_carries_status_code() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/rag/analyze"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = broker(&server).submit_question("x", None).await.unwrap_err();
    assert!(matches!(err, ClientError::Transport { status: 503, .. }));
}

#[tokio::test]
async fn submission_without_query_id_is_protocol_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/rag/analyze"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"accepted": true})))
        .mount(&server)
        .await;

    let err = broker(&server).submit_question("x", None).await.unwrap_err();
    assert!(matches!(err, ClientError::Protocol { .. }));
}

#[tokio::test]
async fn pdf_submission_is_multipart_with_treatment() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/pdf/analyze"))
        .and(body_string_contains("name=\"requestTreatmentId\""))
        .and(body_string_contains("T7"))
        .and(body_string_contains("filename=\"report.pdf\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "QueryId": "P1",
            "FileName": "report.pdf",
            "FileSize": 13
        })))
        .expect(1)
        .mount(&server)
        .await;

    let treatment = TreatmentId::parse("T7");
    let queued = broker(&server)
        .submit_pdf(&sample_pdf(), treatment.as_ref())
        .await
        .expect("pdf submission ok");

    assert_eq!(queued.job_id, JobId::new("P1"));
    assert_eq!(
        queued.receipt,
        Some(UploadReceipt {
            file_name: Some("report.pdf".to_string()),
            file_size: Some(13),
        })
    );
}

#[tokio::test]
async fn rag_status_maps_pending_and_completed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/rag/status/Q1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ProcessedAt": null})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/rag/status/Q2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Result": "<p>ok</p>",
            "RequestTreatmentId": "T1",
            "ProcessedAt": "2024-05-01T10:00:00Z"
        })))
        .mount(&server)
        .await;

    let broker = broker(&server);
    let pending = broker.rag_status(&JobId::new("Q1")).await.expect("status ok");
    let done = broker.rag_status(&JobId::new("Q2")).await.expect("status ok");

    assert_eq!(pending, StatusProbe::Pending { treatment_id: None });
    assert_eq!(
        done,
        StatusProbe::Completed {
            content: "<p>ok</p>".to_string(),
            treatment_id: TreatmentId::parse("T1"),
            processed_at: Some("2024-05-01T10:00:00Z".to_string()),
        }
    );
}

#[tokio::test]
async fn status_not_found_and_empty_body_are_absent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/rag/status/X"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/pdf/status/X"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let broker = broker(&server);
    let id = JobId::new("X");
    assert_eq!(broker.rag_status(&id).await.expect("status ok"), StatusProbe::Absent);
    assert_eq!(broker.pdf_status(&id).await.expect("status ok"), StatusProbe::Absent);
}

#[tokio::test]
async fn status_server_error_is_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/pdf/status/P1"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = broker(&server).pdf_status(&JobId::new("P1")).await.unwrap_err();
    assert_eq!(err.status_code(), Some(500));
}

#[tokio::test]
async fn pdf_status_field_marks_job_pending() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/pdf/status/P1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Status": "Processing",
            "RequestTreatmentId": "T3"
        })))
        .mount(&server)
        .await;

    let probe = broker(&server).pdf_status(&JobId::new("P1")).await.expect("status ok");
    assert_eq!(
        probe,
        StatusProbe::Pending {
            treatment_id: TreatmentId::parse("T3")
        }
    );
}

#[tokio::test]
async fn direct_question_uses_category_route() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/query/full"))
        .and(body_json(json!({"question": "x"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": "<b>full</b>"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/query/dut"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": "<b>dut</b>"})))
        .expect(1)
        .mount(&server)
        .await;

    let direct = direct(&server);
    let full = direct
        .query_text(DocumentCategory::Report, "x", None)
        .await
        .expect("query ok");
    let dut = direct
        .query_text(DocumentCategory::Dut, "x", None)
        .await
        .expect("query ok");

    assert_eq!(full.content, "<b>full</b>");
    assert_eq!(dut.content, "<b>dut</b>");
}

#[tokio::test]
async fn direct_pdf_query_surfaces_page_count() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/query/pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": "<p>summary</p>",
            "page_count": 12,
            "extraction_method": "pdfplumber"
        })))
        .mount(&server)
        .await;

    let answer = direct(&server).query_pdf(&sample_pdf()).await.expect("query ok");
    let details = answer.pdf.expect("pdf details present");
    assert_eq!(details.page_count, Some(12));
    assert_eq!(details.extraction_method.as_deref(), Some("pdfplumber"));
}

#[tokio::test]
async fn catalog_lists_deletes_and_ingests() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/documents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "documents": [
                {"id": "0123456789", "metadata": {"doc_type": "DUT"}},
                {"id": "abc", "metadata": {"name": "manual.txt", "doc_type": "DUT_MANUAL"}}
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"models": [{"name": "llama3"}]})))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/documents/abc"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/process"))
        .and(body_json(json!({"content": "guideline text", "doc_type": "REPORT"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"optimized_chunks": 4})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/process/pdf"))
        .and(body_string_contains("name=\"doc_type\""))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"page_count": 3, "chunks_added": 9})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let catalog = DocumentCatalog::new(Arc::new(direct(&server)));

    let documents = catalog.documents().await.expect("documents ok");
    assert_eq!(documents[0].display_name(), "Doc-01234567");
    assert_eq!(documents[1].display_name(), "manual.txt");

    let health = catalog.health().await.expect("health ok");
    assert_eq!((health.models, health.documents), (1, 2));

    catalog.delete("abc").await.expect("delete ok");

    let report = catalog
        .ingest_text("guideline text", DocumentCategory::Report)
        .await
        .expect("ingest ok");
    assert_eq!(report.chunk_count(), Some(4));

    let pdf_report = catalog
        .ingest_pdf(&sample_pdf(), DocumentCategory::Dut)
        .await
        .expect("pdf ingest ok");
    assert_eq!(pdf_report.chunks_added, Some(9));
}

#[tokio::test]
async fn empty_document_id_is_rejected_before_any_request() {
    let server = MockServer::start().await;
    let catalog = DocumentCatalog::new(Arc::new(direct(&server)));

    let err = catalog.delete("  ").await.unwrap_err();
    assert!(matches!(err, ClientError::Validation(_)));
    assert!(server
        .received_requests()
        .await
        .unwrap_or_default()
        .is_empty());
}
