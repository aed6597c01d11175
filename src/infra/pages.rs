use std::{
    path::{Path, PathBuf},
    time::Instant,
};

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tracing::debug;

use crate::application::gate::{PageCounter, PageProbeError};

const PDF_MAGIC: &[u8] = b"%PDF-";

/// Page counting by parsing the document with `lopdf`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfPageCounter;

#[async_trait]
impl PageCounter for LopdfPageCounter {
    async fn count_pages(&self, path: &Path) -> Result<u32, PageProbeError> {
        let started_at = Instant::now();
        if !has_pdf_header(path).await? {
            return Err(PageProbeError::NotPdf {
                path: path.display().to_string(),
            });
        }

        let owned: PathBuf = path.to_path_buf();
        let pages = tokio::task::spawn_blocking(move || {
            lopdf::Document::load(&owned)
                .map(|document| document.get_pages().len())
                .map_err(|err| PageProbeError::Parse {
                    path: owned.display().to_string(),
                    message: err.to_string(),
                })
        })
        .await
        .map_err(|err| PageProbeError::Task(err.to_string()))??;

        debug!(
            target = "infra::pages",
            op = "count_pages",
            result = "ok",
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            path = %path.display(),
            pages,
            "Counted PDF pages"
        );

        u32::try_from(pages).map_err(|_| PageProbeError::Parse {
            path: path.display().to_string(),
            message: format!("page count {pages} out of range"),
        })
    }
}

async fn has_pdf_header(path: &Path) -> Result<bool, PageProbeError> {
    let read_error = |err: std::io::Error| PageProbeError::Read {
        path: path.display().to_string(),
        message: err.to_string(),
    };

    let file = tokio::fs::File::open(path).await.map_err(read_error)?;
    let mut header = Vec::with_capacity(PDF_MAGIC.len());
    file.take(PDF_MAGIC.len() as u64)
        .read_to_end(&mut header)
        .await
        .map_err(read_error)?;
    Ok(header == PDF_MAGIC)
}
