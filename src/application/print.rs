//! Print dispatch: the per-file render, gate, spool cycle and preview queries.

use std::{path::PathBuf, sync::Arc, time::Instant};

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::application::gate::{ConfirmationGate, GateDecision, PageProbeError};
use crate::application::render::{
    PrepareError, RenderOrchestrator, RenderOutcome, RenderSpec, RenderType,
};
use crate::domain::sheets::PageEstimate;

/// One submission to the print spooler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpoolJob {
    pub path: PathBuf,
    pub printer: Option<String>,
    pub copies: u32,
    pub duplex: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpoolError {
    #[error("print spooler `{cli_path}` unavailable: {message}")]
    Unavailable { cli_path: PathBuf, message: String },
    #[error("print spooler rejected the job (exit {exit_code:?}): {stderr}")]
    Rejected {
        exit_code: Option<i32>,
        stderr: String,
    },
}

/// Hands printable files to the system print queue.
#[async_trait]
pub trait Spooler: Send + Sync {
    /// Submit `job` and return the spooler's job identifier.
    async fn submit(&self, job: &SpoolJob) -> Result<String, SpoolError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintRequest {
    pub spec: RenderSpec,
    pub copies: u32,
    /// Falls back to [`PrintDefaults::duplex`] when unset.
    pub duplex: Option<bool>,
    /// Falls back to [`PrintDefaults::printer`] when unset.
    pub printer: Option<String>,
}

impl PrintRequest {
    pub fn new(spec: RenderSpec) -> Self {
        Self {
            spec,
            copies: 1,
            duplex: None,
            printer: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrintDefaults {
    pub printer: Option<String>,
    pub duplex: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrintResult {
    pub path: String,
    #[serde(flatten)]
    pub status: PrintStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PrintStatus {
    Printed {
        job_id: String,
        render_type: RenderType,
        /// Render failure that caused the original file to be printed instead.
        #[serde(skip_serializing_if = "Option::is_none")]
        fallback: Option<String>,
    },
    ConfirmationRequired {
        estimate: PageEstimate,
        message: String,
    },
    Failed {
        error: String,
    },
}

impl PrintStatus {
    pub fn is_failure(&self) -> bool {
        matches!(self, PrintStatus::Failed { .. })
    }
}

/// Page accounting for one file, without printing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreviewReport {
    pub path: String,
    pub render_type: RenderType,
    pub page_count: u32,
    pub physical_sheets: u32,
    pub is_duplex: bool,
}

#[derive(Debug, Error)]
pub enum PreviewError {
    #[error(transparent)]
    Prepare(#[from] PrepareError),
    #[error("cannot count pages: {0}")]
    PageCount(#[from] PageProbeError),
}

#[derive(Clone)]
pub struct PrintService {
    orchestrator: RenderOrchestrator,
    gate: ConfirmationGate,
    spooler: Arc<dyn Spooler>,
    defaults: PrintDefaults,
}

impl PrintService {
    pub fn new(
        orchestrator: RenderOrchestrator,
        gate: ConfirmationGate,
        spooler: Arc<dyn Spooler>,
        defaults: PrintDefaults,
    ) -> Self {
        Self {
            orchestrator,
            gate,
            spooler,
            defaults,
        }
    }

    /// Print each request in order. Every file gets its own result; a failure
    /// or confirmation pause for one file does not affect the others.
    ///
    /// With `confirmed` set the confirmation gate is skipped.
    pub async fn print_batch(
        &self,
        requests: &[PrintRequest],
        confirmed: bool,
    ) -> Vec<PrintResult> {
        let mut results = Vec::with_capacity(requests.len());
        for request in requests {
            let status = self.print_one(request, confirmed).await;
            results.push(PrintResult {
                path: request.spec.path.clone(),
                status,
            });
        }
        results
    }

    async fn print_one(&self, request: &PrintRequest, confirmed: bool) -> PrintStatus {
        let started_at = Instant::now();
        let outcome = match self.orchestrator.prepare(&request.spec).await {
            Ok(outcome) => outcome,
            Err(err) => {
                return PrintStatus::Failed {
                    error: err.to_string(),
                };
            }
        };

        let duplex = request.duplex.unwrap_or(self.defaults.duplex);
        let status = self.gate_and_spool(request, &outcome, duplex, confirmed).await;
        release(outcome);

        match &status {
            PrintStatus::Printed {
                job_id,
                render_type,
                ..
            } => info!(
                target = "application::print",
                op = "print",
                result = "ok",
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                path = %request.spec.path,
                render_type = render_type.as_str(),
                job_id = %job_id,
                copies = request.copies,
                duplex,
                "Submitted print job"
            ),
            PrintStatus::Failed { error } => warn!(
                target = "application::print",
                op = "print",
                result = "error",
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                path = %request.spec.path,
                error = %error,
                "Print job failed"
            ),
            PrintStatus::ConfirmationRequired { .. } => {}
        }
        status
    }

    async fn gate_and_spool(
        &self,
        request: &PrintRequest,
        outcome: &RenderOutcome,
        duplex: bool,
        confirmed: bool,
    ) -> PrintStatus {
        if !confirmed
            && let GateDecision::ConfirmationRequired { estimate } =
                self.gate.check(outcome.artifact_path(), duplex).await
        {
            let threshold = self.gate.threshold().get();
            return PrintStatus::ConfirmationRequired {
                message: confirmation_message(&request.spec.path, &estimate, threshold),
                estimate,
            };
        }

        let job = SpoolJob {
            path: outcome.artifact_path().to_path_buf(),
            printer: request
                .printer
                .clone()
                .or_else(|| self.defaults.printer.clone()),
            copies: request.copies.max(1),
            duplex,
        };

        match self.spooler.submit(&job).await {
            Ok(job_id) => PrintStatus::Printed {
                job_id,
                render_type: outcome.render_type(),
                fallback: outcome.fallback_reason().map(ToString::to_string),
            },
            Err(err) => PrintStatus::Failed {
                error: err.to_string(),
            },
        }
    }

    /// Render `spec`, count its pages and report the sheet usage.
    pub async fn preview(
        &self,
        spec: &RenderSpec,
        duplex: Option<bool>,
    ) -> Result<PreviewReport, PreviewError> {
        let outcome = self.orchestrator.prepare(spec).await?;
        let duplex = duplex.unwrap_or(self.defaults.duplex);
        let estimate = self.gate.estimate(outcome.artifact_path(), duplex).await;
        let render_type = outcome.render_type();
        release(outcome);

        let estimate = estimate?;
        Ok(PreviewReport {
            path: spec.path.clone(),
            render_type,
            page_count: estimate.page_count,
            physical_sheets: estimate.physical_sheets,
            is_duplex: estimate.is_duplex,
        })
    }
}

fn confirmation_message(path: &str, estimate: &PageEstimate, threshold: u32) -> String {
    let sides = if estimate.is_duplex { ", duplex" } else { "" };
    format!(
        "`{path}` needs {sheets} sheet(s) ({pages} page(s){sides}), above the confirmation \
         threshold of {threshold}; confirm to print it",
        sheets = estimate.physical_sheets,
        pages = estimate.page_count,
    )
}

/// Delete a temporary artifact, logging instead of failing.
fn release(outcome: RenderOutcome) {
    if !outcome.is_temporary() {
        return;
    }
    let artifact = outcome.artifact_path().to_path_buf();
    if let Err(err) = outcome.cleanup() {
        warn!(
            target = "application::print",
            op = "cleanup",
            result = "error",
            artifact = %artifact.display(),
            error = %err,
            "Failed to remove temporary artifact"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::gate::PageCounter;
    use crate::application::render::{CodeRenderOptions, RenderConfig, RenderError, Renderer};
    use crate::domain::access::AccessPolicy;
    use crate::domain::sheets::ConfirmationThreshold;
    use std::{fs, path::Path, sync::Mutex};
    use tempfile::TempDir;

    struct PdfRenderer;

    #[async_trait]
    impl Renderer for PdfRenderer {
        async fn render_markdown(
            &self,
            _source: &Path,
            out_dir: &Path,
        ) -> Result<PathBuf, RenderError> {
            let pdf = out_dir.join("document.pdf");
            fs::write(&pdf, b"%PDF-1.4").unwrap();
            Ok(pdf)
        }

        async fn render_code(
            &self,
            _source: &Path,
            _options: &CodeRenderOptions,
            _out_dir: &Path,
        ) -> Result<PathBuf, RenderError> {
            Err(RenderError::Unsupported {
                reason: "no code".to_string(),
            })
        }
    }

    /// Page count taken from the file name: `pages-25.pdf` has 25 pages.
    struct NamePageCounter;

    #[async_trait]
    impl PageCounter for NamePageCounter {
        async fn count_pages(&self, path: &Path) -> Result<u32, PageProbeError> {
            path.file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| stem.strip_prefix("pages-"))
                .and_then(|count| count.parse().ok())
                .ok_or_else(|| PageProbeError::NotPdf {
                    path: path.display().to_string(),
                })
        }
    }

    #[derive(Default)]
    struct RecordingSpooler {
        jobs: Mutex<Vec<SpoolJob>>,
        fail: bool,
    }

    #[async_trait]
    impl Spooler for RecordingSpooler {
        async fn submit(&self, job: &SpoolJob) -> Result<String, SpoolError> {
            assert!(job.path.exists(), "artifact removed before spooling");
            let mut jobs = self.jobs.lock().unwrap();
            jobs.push(job.clone());
            if self.fail {
                return Err(SpoolError::Rejected {
                    exit_code: Some(1),
                    stderr: "no default destination".to_string(),
                });
            }
            Ok(format!("office-{}", jobs.len()))
        }
    }

    struct Fixture {
        root: TempDir,
        spooler: Arc<RecordingSpooler>,
        service: PrintService,
    }

    impl Fixture {
        fn file(&self, name: &str) -> String {
            let path = self.root.path().join(name);
            fs::write(&path, "content").unwrap();
            path.to_string_lossy().into_owned()
        }
    }

    fn fixture_with(spooler: RecordingSpooler, config: RenderConfig) -> Fixture {
        let root = tempfile::Builder::new()
            .prefix("printgate-print")
            .tempdir()
            .unwrap();
        let policy = AccessPolicy::new(vec![root.path().to_path_buf()], Vec::new());
        let orchestrator = RenderOrchestrator::new(Arc::new(policy), config, Arc::new(PdfRenderer));
        let gate = ConfirmationGate::new(Arc::new(NamePageCounter), ConfirmationThreshold::new(10));
        let spooler = Arc::new(spooler);
        let service = PrintService::new(
            orchestrator,
            gate,
            spooler.clone(),
            PrintDefaults {
                printer: Some("office".to_string()),
                duplex: false,
            },
        );
        Fixture {
            root,
            spooler,
            service,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(RecordingSpooler::default(), RenderConfig::default())
    }

    #[tokio::test]
    async fn batch_results_are_isolated_per_file() {
        let fx = fixture();
        let small = fx.file("pages-3.pdf");
        let large = fx.file("pages-40.pdf");
        let hidden = fx.file(".pages-1.pdf");
        let requests: Vec<PrintRequest> = [&small, &large, &hidden]
            .into_iter()
            .map(|path| PrintRequest::new(RenderSpec::new(path.as_str())))
            .collect();

        let results = fx.service.print_batch(&requests, false).await;

        assert_eq!(results.len(), 3);
        assert!(matches!(results[0].status, PrintStatus::Printed { .. }));
        match &results[1].status {
            PrintStatus::ConfirmationRequired { estimate, message } => {
                assert_eq!(estimate.physical_sheets, 40);
                assert!(message.contains("threshold of 10"), "{message}");
            }
            other => panic!("expected confirmation, got {other:?}"),
        }
        match &results[2].status {
            PrintStatus::Failed { error } => assert!(error.contains("hidden"), "{error}"),
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(fx.spooler.jobs.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn confirmed_batch_skips_gate() {
        let fx = fixture();
        let large = fx.file("pages-40.pdf");
        let mut request = PrintRequest::new(RenderSpec::new(large.as_str()));
        request.copies = 2;
        request.duplex = Some(true);

        let results = fx.service.print_batch(&[request], true).await;

        assert!(matches!(results[0].status, PrintStatus::Printed { .. }));
        let jobs = fx.spooler.jobs.lock().unwrap();
        assert_eq!(jobs[0].copies, 2);
        assert!(jobs[0].duplex);
        assert_eq!(jobs[0].printer.as_deref(), Some("office"));
        assert_eq!(jobs[0].path, fs::canonicalize(&large).unwrap());
    }

    #[tokio::test]
    async fn rendered_artifacts_are_removed_after_printing() {
        let fx = fixture();
        let notes = fx.file("notes.md");

        let results = fx
            .service
            .print_batch(&[PrintRequest::new(RenderSpec::new(notes.as_str()))], false)
            .await;

        match &results[0].status {
            PrintStatus::Printed { render_type, .. } => {
                assert_eq!(*render_type, RenderType::Markdown)
            }
            other => panic!("expected printed, got {other:?}"),
        }
        let jobs = fx.spooler.jobs.lock().unwrap();
        assert!(!jobs[0].path.exists(), "temporary artifact leaked");
        assert!(Path::new(&notes).exists());
    }

    #[tokio::test]
    async fn spool_failure_still_cleans_up() {
        let fx = fixture_with(
            RecordingSpooler {
                fail: true,
                ..RecordingSpooler::default()
            },
            RenderConfig::default(),
        );
        let notes = fx.file("notes.md");

        let results = fx
            .service
            .print_batch(&[PrintRequest::new(RenderSpec::new(notes.as_str()))], false)
            .await;

        assert!(results[0].status.is_failure());
        let jobs = fx.spooler.jobs.lock().unwrap();
        assert!(!jobs[0].path.exists(), "temporary artifact leaked");
    }

    #[tokio::test]
    async fn code_render_failure_falls_back_when_enabled() {
        let config = RenderConfig {
            fallback_on_error: true,
            ..RenderConfig::default()
        };
        let fx = fixture_with(RecordingSpooler::default(), config);
        let script = fx.file("main.py");

        let results = fx
            .service
            .print_batch(&[PrintRequest::new(RenderSpec::new(script.as_str()))], false)
            .await;

        match &results[0].status {
            PrintStatus::Printed {
                render_type,
                fallback,
                ..
            } => {
                assert_eq!(*render_type, RenderType::None);
                assert!(fallback.as_deref().unwrap_or_default().contains("no code"));
            }
            other => panic!("expected printed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn preview_reports_sheet_usage() {
        let fx = fixture();
        let report = fx
            .service
            .preview(&RenderSpec::new(fx.file("pages-11.pdf")), Some(true))
            .await
            .unwrap();

        assert_eq!(report.page_count, 11);
        assert_eq!(report.physical_sheets, 6);
        assert!(report.is_duplex);
        assert_eq!(report.render_type, RenderType::None);
    }

    #[tokio::test]
    async fn preview_of_non_pdf_is_an_error() {
        let fx = fixture();
        let err = fx
            .service
            .preview(&RenderSpec::new(fx.file("photo.png")), None)
            .await
            .unwrap_err();
        assert!(matches!(err, PreviewError::PageCount(_)));
    }

    #[test]
    fn results_serialize_with_status_tag() {
        let result = PrintResult {
            path: "/docs/a.pdf".to_string(),
            status: PrintStatus::Printed {
                job_id: "office-7".to_string(),
                render_type: RenderType::None,
                fallback: None,
            },
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "printed");
        assert_eq!(json["job_id"], "office-7");
        assert_eq!(json["render_type"], "none");
        assert!(json.get("fallback").is_none());
    }
}
