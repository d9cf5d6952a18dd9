use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rag_jobs_core::PdfUpload;
use std::io::{self, Write};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl LoadedFile {
    pub fn is_pdf(&self) -> bool {
        let by_extension = Path::new(&self.file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
        by_extension || self.bytes.starts_with(b"%PDF")
    }

    pub fn into_upload(self) -> PdfUpload {
        PdfUpload::new(self.file_name, self.bytes)
    }

    pub fn into_text(self) -> io::Result<String> {
        String::from_utf8(self.bytes)
            .map_err(|error| io::Error::new(io::ErrorKind::InvalidData, error))
    }
}

/// Where user-selected documents come from.
#[async_trait]
pub trait FileSource {
    async fn load(&self, path: &Path) -> io::Result<LoadedFile>;
}

pub struct LocalFiles;

#[async_trait]
impl FileSource for LocalFiles {
    async fn load(&self, path: &Path) -> io::Result<LoadedFile> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("path has no file name: {}", path.display()),
                )
            })?
            .to_string();
        Ok(LoadedFile { file_name, bytes })
    }
}

pub trait ClipboardSink {
    fn copy(&mut self, text: &str) -> io::Result<()>;
}

/// Sets the terminal clipboard through the OSC 52 escape sequence.
pub struct Osc52Clipboard<W> {
    out: W,
}

impl<W: Write> Osc52Clipboard<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write> ClipboardSink for Osc52Clipboard<W> {
    fn copy(&mut self, text: &str) -> io::Result<()> {
        write!(self.out, "\x1b]52;c;{}\x07", STANDARD.encode(text))?;
        self.out.flush()
    }
}
