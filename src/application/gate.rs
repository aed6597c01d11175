//! Confirmation gate: decides whether a rendered artifact may be spooled
//! without asking the user first.

use std::{path::Path, sync::Arc};

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::domain::sheets::{ConfirmationThreshold, PageEstimate};

/// Why a page count could not be determined. The gate treats every variant
/// as "confirmation not applicable".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PageProbeError {
    #[error("`{path}` is not a PDF document")]
    NotPdf { path: String },
    #[error("failed to read `{path}`: {message}")]
    Read { path: String, message: String },
    #[error("failed to parse PDF `{path}`: {message}")]
    Parse { path: String, message: String },
    #[error("page probe task failed: {0}")]
    Task(String),
}

/// Counts the pages of a page-oriented document.
#[async_trait]
pub trait PageCounter: Send + Sync {
    async fn count_pages(&self, path: &Path) -> Result<u32, PageProbeError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum GateDecision {
    /// Spool now. `estimate` is `None` when no page count was available or
    /// the check is disabled.
    Proceed { estimate: Option<PageEstimate> },
    ConfirmationRequired { estimate: PageEstimate },
}

impl GateDecision {
    pub fn requires_confirmation(&self) -> bool {
        matches!(self, GateDecision::ConfirmationRequired { .. })
    }
}

#[derive(Clone)]
pub struct ConfirmationGate {
    counter: Arc<dyn PageCounter>,
    threshold: ConfirmationThreshold,
}

impl ConfirmationGate {
    pub fn new(counter: Arc<dyn PageCounter>, threshold: ConfirmationThreshold) -> Self {
        Self { counter, threshold }
    }

    pub fn threshold(&self) -> ConfirmationThreshold {
        self.threshold
    }

    /// Probe `artifact` and compute its sheet usage.
    pub async fn estimate(
        &self,
        artifact: &Path,
        duplex: bool,
    ) -> Result<PageEstimate, PageProbeError> {
        let pages = self.counter.count_pages(artifact).await?;
        Ok(PageEstimate::new(pages, duplex))
    }

    /// Decide whether `artifact` may be printed without confirmation.
    /// Probe failures never block printing.
    pub async fn check(&self, artifact: &Path, duplex: bool) -> GateDecision {
        if !self.threshold.is_enabled() {
            return GateDecision::Proceed { estimate: None };
        }

        let estimate = match self.estimate(artifact, duplex).await {
            Ok(estimate) => estimate,
            Err(err) => {
                debug!(
                    target = "application::gate",
                    op = "check",
                    result = "not_applicable",
                    artifact = %artifact.display(),
                    error = %err,
                    "Page count unavailable; skipping confirmation check"
                );
                return GateDecision::Proceed { estimate: None };
            }
        };

        if estimate.requires_confirmation(self.threshold) {
            metrics::counter!("printgate_confirmation_required_total").increment(1);
            info!(
                target = "application::gate",
                op = "check",
                result = "confirmation_required",
                artifact = %artifact.display(),
                page_count = estimate.page_count,
                physical_sheets = estimate.physical_sheets,
                duplex = estimate.is_duplex,
                threshold = self.threshold.get(),
                "Print job exceeds confirmation threshold"
            );
            GateDecision::ConfirmationRequired { estimate }
        } else {
            GateDecision::Proceed {
                estimate: Some(estimate),
            }
        }
    }
}
