use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    process::Stdio,
    time::Instant,
};

use tokio::process::Command;
use tracing::{info, warn};
use url::Url;

use crate::application::render::types::RenderError;

const HTML_FILE: &str = "document.html";
const PDF_FILE: &str = "document.pdf";
const PROFILE_DIR: &str = "browser-profile";

/// HTML to PDF export through a headless Chrome/Chromium executable.
#[derive(Debug, Clone)]
pub struct ChromePdf {
    cli_path: PathBuf,
}

impl ChromePdf {
    pub fn new(cli_path: PathBuf) -> Self {
        Self { cli_path }
    }

    /// Write `html` into `work_dir` and print it to `work_dir/document.pdf`.
    pub async fn print_to_pdf(&self, html: &str, work_dir: &Path) -> Result<PathBuf, RenderError> {
        let started_at = Instant::now();
        let html_path = work_dir.join(HTML_FILE);
        let pdf_path = work_dir.join(PDF_FILE);

        let html_url = Url::from_file_path(&html_path).map_err(|()| RenderError::Workspace {
            message: format!(
                "work directory `{}` is not an absolute path",
                work_dir.display()
            ),
        })?;

        tokio::fs::write(&html_path, html)
            .await
            .map_err(RenderError::workspace)?;

        let output = Command::new(&self.cli_path)
            .arg("--headless")
            .arg("--disable-gpu")
            .arg("--no-first-run")
            .arg("--no-pdf-header-footer")
            .arg(format!(
                "--user-data-dir={}",
                work_dir.join(PROFILE_DIR).display()
            ))
            .arg(format!("--print-to-pdf={}", pdf_path.display()))
            .arg(html_url.as_str())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|err| {
                warn!(
                    target = "application::render::chrome",
                    op = "chrome::print_to_pdf",
                    result = "error",
                    elapsed_ms = started_at.elapsed().as_millis() as u64,
                    error_code = "spawn_cli",
                    cli_path = %self.cli_path.display(),
                    error = %err,
                    "Failed to spawn headless browser"
                );
                if err.kind() == ErrorKind::NotFound {
                    RenderError::BrowserUnavailable {
                        cli_path: self.cli_path.clone(),
                        message: err.to_string(),
                    }
                } else {
                    RenderError::workspace(err)
                }
            })?;

        if !output.status.success() {
            let exit_code = output.status.code();
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            warn!(
                target = "application::render::chrome",
                op = "chrome::print_to_pdf",
                result = "error",
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                exit_code = exit_code.map(i64::from).unwrap_or(-1),
                error_code = "browser_cli",
                stderr = %stderr,
                "Headless browser PDF export failed"
            );
            return Err(RenderError::Browser { exit_code, stderr });
        }

        let produced = tokio::fs::metadata(&pdf_path)
            .await
            .map(|meta| meta.is_file() && meta.len() > 0)
            .unwrap_or(false);
        if !produced {
            return Err(RenderError::MissingOutput { path: pdf_path });
        }

        info!(
            target = "application::render::chrome",
            op = "chrome::print_to_pdf",
            result = "ok",
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            html_bytes = html.len(),
            pdf_path = %pdf_path.display(),
            "Rendered PDF via headless browser"
        );

        Ok(pdf_path)
    }
}
