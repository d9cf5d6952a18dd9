use rag_jobs_core::{
    Activity, BackendHealth, DisplayState, DocumentRecord, JobResult, ModelInfo, PdfIngestReport,
    ProcessReport,
};
use std::fmt::Write;

pub fn render_state(state: &DisplayState) -> String {
    let mut out = String::new();

    if let Some(descriptor) = &state.descriptor {
        let _ = writeln!(
            out,
            "job: {} ({})",
            descriptor.job_id,
            descriptor.kind.label()
        );
    }
    if let Some(receipt) = &state.receipt {
        if let Some(name) = &receipt.file_name {
            let size = receipt
                .file_size
                .map(|size| format!(" {size} bytes"))
                .unwrap_or_default();
            let _ = writeln!(out, "uploaded: {name}{size}");
        }
    }
    if let Some(treatment) = state.treatment.get() {
        let _ = writeln!(out, "treatment: {treatment}");
    }

    match &state.result {
        Some(result) => out.push_str(&render_result(result)),
        None if state.activity == Activity::Submitting => out.push_str("submitting...\n"),
        None => {}
    }
    if let Some(error) = &state.error {
        let _ = writeln!(out, "error: {error}");
    }
    out
}

pub fn render_result(result: &JobResult) -> String {
    match result {
        JobResult::Pending { job_id, .. } => {
            format!("still processing {job_id}; try again in a few seconds\n")
        }
        JobResult::NotFound { job_id } => format!("no result found for {job_id}\n"),
        JobResult::TimedOut {
            job_id, attempts, ..
        } => format!(
            "gave up waiting after {attempts} checks; run `rag-jobs lookup {job_id}` later\n"
        ),
        JobResult::Completed(payload) => {
            let mut out = String::new();
            if let Some(details) = &payload.pdf {
                if let Some(pages) = details.page_count {
                    let _ = writeln!(out, "pages: {pages}");
                }
                if let Some(method) = &details.extraction_method {
                    let _ = writeln!(out, "extraction: {method}");
                }
            }
            out.push_str(&payload.content);
            if !payload.content.ends_with('\n') {
                out.push('\n');
            }
            out
        }
    }
}

pub fn render_documents(documents: &[DocumentRecord]) -> String {
    if documents.is_empty() {
        return "no documents loaded\n".to_string();
    }
    documents
        .iter()
        .map(|document| {
            format!(
                "{}\t{}\t{}\n",
                document.id,
                document.metadata.doc_type.as_deref().unwrap_or("-"),
                document.display_name()
            )
        })
        .collect()
}

pub fn render_models(models: &[ModelInfo]) -> String {
    if models.is_empty() {
        return "no models loaded\n".to_string();
    }
    models.iter().map(|model| format!("{}\n", model.name)).collect()
}

pub fn render_health(health: &BackendHealth) -> String {
    format!("models: {}\ndocuments: {}\n", health.models, health.documents)
}

pub fn render_text_ingest(report: &ProcessReport) -> String {
    match report.chunk_count() {
        Some(count) => format!("uploaded; {count} chunks indexed\n"),
        None => "uploaded\n".to_string(),
    }
}

pub fn render_pdf_ingest(report: &PdfIngestReport) -> String {
    format!(
        "uploaded; pages={} chunks={}\n",
        report
            .page_count
            .map_or_else(|| "?".to_string(), |count| count.to_string()),
        report
            .chunks_added
            .map_or_else(|| "?".to_string(), |count| count.to_string())
    )
}
