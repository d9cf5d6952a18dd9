mod capabilities;
mod render;

use capabilities::{ClipboardSink, FileSource, LocalFiles, Osc52Clipboard};
use chrono::Utc;
use clap::{Parser, Subcommand};
use rag_jobs_core::{
    Activity, ClientConfig, DisplayState, DocumentCatalog, DocumentCategory, HttpDirectProcessor,
    HttpJobBroker, JobCoordinator, PollPolicy, QueryMode, SubmissionRequest,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

type Coordinator = JobCoordinator<HttpJobBroker, HttpDirectProcessor>;

#[derive(Parser)]
#[command(name = "rag-jobs", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Job-broker API root
    #[arg(long, env = "RAG_BROKER_URL", default_value = rag_jobs_core::DEFAULT_BROKER_URL)]
    broker_url: String,

    /// Direct-processing service root
    #[arg(long, env = "RAG_DIRECT_URL", default_value = rag_jobs_core::DEFAULT_DIRECT_URL)]
    direct_url: String,

    /// Per-request timeout in seconds
    #[arg(long, env = "RAG_REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    request_timeout_secs: u64,

    /// Delay between status checks in milliseconds
    #[arg(long, env = "RAG_POLL_INTERVAL_MS", default_value_t = 2_000)]
    poll_interval_ms: u64,

    /// Status checks before giving up on a job
    #[arg(long, env = "RAG_POLL_MAX_ATTEMPTS", default_value_t = 60)]
    poll_max_attempts: u32,

    /// Consecutive failed checks treated as "not found" (0 disables)
    #[arg(long, env = "RAG_POLL_MAX_CONSECUTIVE_ERRORS", default_value_t = 3)]
    poll_max_consecutive_errors: u32,

    /// Category used when a command gets no --doc-type
    #[arg(long, env = "RAG_DOC_TYPE", default_value = "DUT")]
    default_doc_type: DocumentCategory,
}

impl Cli {
    fn client_config(&self) -> ClientConfig {
        ClientConfig {
            broker_url: self.broker_url.clone(),
            direct_url: self.direct_url.clone(),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            poll: PollPolicy {
                max_attempts: self.poll_max_attempts,
                interval: Duration::from_millis(self.poll_interval_ms),
                max_consecutive_errors: self.poll_max_consecutive_errors,
            },
            category: self.default_doc_type,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// List documents held by the direct-processing service.
    Documents,
    /// Delete one document by id.
    Delete {
        id: String,
    },
    /// List loaded models.
    Models,
    /// Show model and document counts.
    Status,
    /// Ingest a document; PDFs go through the PDF pipeline, anything else as text.
    Upload {
        #[arg(long)]
        file: PathBuf,
        /// DUT, DUT_MANUAL, REPORT or OTHER
        #[arg(long)]
        doc_type: Option<DocumentCategory>,
    },
    /// Ask a question.
    Ask {
        #[arg(long)]
        question: String,
        #[command(flatten)]
        submit: SubmitArgs,
        /// Selects /query/dut (DUT) or /query/full (others) in sync mode
        #[arg(long)]
        doc_type: Option<DocumentCategory>,
    },
    /// Analyze a PDF.
    AnalyzePdf {
        #[arg(long)]
        file: PathBuf,
        #[command(flatten)]
        submit: SubmitArgs,
    },
    /// Look up a job id from either pipeline.
    Lookup {
        id: String,
    },
}

#[derive(clap::Args)]
struct SubmitArgs {
    /// Call the direct-processing service and wait for the answer inline.
    #[arg(long, default_value_t = false)]
    sync: bool,
    /// Caller-supplied treatment id.
    #[arg(long)]
    treatment_id: Option<String>,
    /// Print the job id and exit without polling.
    #[arg(long, default_value_t = false)]
    no_wait: bool,
    /// Copy the job id to the terminal clipboard.
    #[arg(long, default_value_t = false)]
    copy_id: bool,
}

impl SubmitArgs {
    fn mode(&self) -> QueryMode {
        if self.sync {
            QueryMode::Sync
        } else {
            QueryMode::Async
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = cli.client_config();
    info!(
        version = app_version,
        broker = %config.broker_url,
        direct = %config.direct_url,
        started_at = %Utc::now().to_rfc3339(),
        "rag-jobs boot"
    );

    match cli.command {
        Command::Documents => {
            let documents = catalog(&config)?.documents().await?;
            print!("{}", render::render_documents(&documents));
        }
        Command::Delete { id } => {
            catalog(&config)?.delete(&id).await?;
            println!("deleted {id}");
        }
        Command::Models => {
            let models = catalog(&config)?.models().await?;
            print!("{}", render::render_models(&models));
        }
        Command::Status => {
            let health = catalog(&config)?.health().await?;
            print!("{}", render::render_health(&health));
        }
        Command::Upload { file, doc_type } => {
            let doc_type = doc_type.unwrap_or(config.category);
            let loaded = LocalFiles.load(&file).await?;
            let catalog = catalog(&config)?;
            if loaded.is_pdf() {
                let report = catalog.ingest_pdf(&loaded.into_upload(), doc_type).await?;
                print!("{}", render::render_pdf_ingest(&report));
            } else {
                let report = catalog.ingest_text(&loaded.into_text()?, doc_type).await?;
                print!("{}", render::render_text_ingest(&report));
            }
        }
        Command::Ask {
            question,
            submit,
            doc_type,
        } => {
            let request = SubmissionRequest::question(question)
                .with_mode(submit.mode())
                .with_category(doc_type.unwrap_or(config.category))
                .with_treatment_hint(submit.treatment_id.clone());
            run_submission(&config, request, &submit).await?;
        }
        Command::AnalyzePdf { file, submit } => {
            let loaded = LocalFiles.load(&file).await?;
            if !loaded.is_pdf() {
                warn!(file = %file.display(), "file does not look like a pdf; sending anyway");
            }
            let request = SubmissionRequest::pdf(loaded.into_upload())
                .with_mode(submit.mode())
                .with_treatment_hint(submit.treatment_id.clone());
            run_submission(&config, request, &submit).await?;
        }
        Command::Lookup { id } => {
            let coordinator = Coordinator::from_config(&config)?;
            let state = coordinator.resolve(&id).await?;
            print!("{}", render::render_state(&state));
        }
    }

    Ok(())
}

fn catalog(config: &ClientConfig) -> anyhow::Result<DocumentCatalog<HttpDirectProcessor>> {
    Ok(DocumentCatalog::new(Arc::new(
        HttpDirectProcessor::from_config(config)?,
    )))
}

async fn run_submission(
    config: &ClientConfig,
    request: SubmissionRequest,
    args: &SubmitArgs,
) -> anyhow::Result<()> {
    let coordinator = Coordinator::from_config(config)?;
    let state = coordinator.submit(request).await?;

    let Some(descriptor) = state.descriptor.clone() else {
        print!("{}", render::render_state(&state));
        return Ok(());
    };

    println!("job: {} ({})", descriptor.job_id, descriptor.kind.label());
    if let Some(treatment) = state.treatment.get() {
        println!("treatment: {treatment}");
    }
    if args.copy_id {
        Osc52Clipboard::new(std::io::stdout()).copy(descriptor.job_id.as_str())?;
        eprintln!("job id copied");
    }
    if args.no_wait {
        coordinator.shutdown();
        println!("run `rag-jobs lookup {}` to fetch the answer", descriptor.job_id);
        return Ok(());
    }

    let settled = follow(&coordinator, config.poll.max_attempts).await;
    if let Some(result) = &settled.result {
        print!("{}", render::render_result(result));
    }
    if let Some(error) = &settled.error {
        println!("error: {error}");
    }
    coordinator.shutdown();
    Ok(())
}

/// Streams pending progress to stderr until the job settles.
async fn follow(coordinator: &Coordinator, max_attempts: u32) -> DisplayState {
    let mut updates = coordinator.subscribe();
    let mut reported = 0;
    loop {
        let state = updates.borrow_and_update().clone();
        if let Activity::Polling { attempt } = state.activity {
            if attempt > reported {
                reported = attempt;
                eprintln!("still processing ({attempt}/{max_attempts})");
            }
        }
        if !state.activity.is_busy() || updates.changed().await.is_err() {
            return state;
        }
    }
}
