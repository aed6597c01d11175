use std::{
    fmt, io,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use serde::Serialize;
use tempfile::TempDir;
use thiserror::Error;

use crate::domain::access::AccessDenied;

/// Transformation applied to a file before it is spooled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderType {
    None,
    Markdown,
    Code,
}

impl RenderType {
    pub fn as_str(self) -> &'static str {
        match self {
            RenderType::None => "none",
            RenderType::Markdown => "markdown",
            RenderType::Code => "code",
        }
    }
}

impl fmt::Display for RenderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-call overrides supplied by the agent. Unset fields fall back to configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderOverrides {
    pub line_numbers: Option<bool>,
    pub color_scheme: Option<String>,
    pub font_size: Option<String>,
    pub line_spacing: Option<String>,
    pub force_markdown: bool,
    pub force_code: bool,
}

/// Input to [`RenderOrchestrator::prepare`](super::RenderOrchestrator::prepare).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderSpec {
    pub path: String,
    pub overrides: RenderOverrides,
}

impl RenderSpec {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            overrides: RenderOverrides::default(),
        }
    }

    pub fn with_overrides(mut self, overrides: RenderOverrides) -> Self {
        self.overrides = overrides;
        self
    }
}

/// Fully resolved options for one code render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeRenderOptions {
    /// Highlighting language token, e.g. `python`.
    pub language: String,
    pub line_numbers: bool,
    /// Name of a syntect theme.
    pub color_scheme: String,
    /// CSS length, e.g. `10pt`.
    pub font_size: String,
    /// CSS `line-height` value.
    pub line_spacing: String,
}

/// Global render behaviour and code defaults, taken from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderConfig {
    pub auto_markdown: bool,
    pub auto_code: bool,
    /// Lowercase extensions without the leading dot.
    pub code_exclude_extensions: Vec<String>,
    pub fallback_on_error: bool,
    pub line_numbers: bool,
    pub color_scheme: String,
    pub font_size: String,
    pub line_spacing: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            auto_markdown: true,
            auto_code: true,
            code_exclude_extensions: Vec::new(),
            fallback_on_error: false,
            line_numbers: true,
            color_scheme: "InspiredGitHub".to_string(),
            font_size: "10pt".to_string(),
            line_spacing: "1.5".to_string(),
        }
    }
}

#[derive(Debug)]
enum Artifact {
    Original(PathBuf),
    /// Rendered PDF living inside a private directory that is removed with it.
    Temporary { path: PathBuf, dir: TempDir },
}

/// Printable artifact for one file.
///
/// Temporary artifacts are deleted when the outcome is dropped; call
/// [`cleanup`](Self::cleanup) to observe deletion errors.
#[derive(Debug)]
pub struct RenderOutcome {
    artifact: Artifact,
    render_type: RenderType,
    fallback_reason: Option<RenderError>,
}

impl RenderOutcome {
    pub(crate) fn original(path: PathBuf) -> Self {
        Self {
            artifact: Artifact::Original(path),
            render_type: RenderType::None,
            fallback_reason: None,
        }
    }

    pub(crate) fn rendered(path: PathBuf, dir: TempDir, render_type: RenderType) -> Self {
        Self {
            artifact: Artifact::Temporary { path, dir },
            render_type,
            fallback_reason: None,
        }
    }

    pub(crate) fn fallback(path: PathBuf, reason: RenderError) -> Self {
        Self {
            artifact: Artifact::Original(path),
            render_type: RenderType::None,
            fallback_reason: Some(reason),
        }
    }

    pub fn artifact_path(&self) -> &Path {
        match &self.artifact {
            Artifact::Original(path) | Artifact::Temporary { path, .. } => path,
        }
    }

    pub fn is_temporary(&self) -> bool {
        matches!(self.artifact, Artifact::Temporary { .. })
    }

    pub fn render_type(&self) -> RenderType {
        self.render_type
    }

    /// The render failure that caused the original file to be substituted.
    pub fn fallback_reason(&self) -> Option<&RenderError> {
        self.fallback_reason.as_ref()
    }

    /// Delete the temporary artifact, if any.
    pub fn cleanup(self) -> io::Result<()> {
        match self.artifact {
            Artifact::Original(_) => Ok(()),
            Artifact::Temporary { dir, .. } => dir.close(),
        }
    }
}

/// Failures raised by the rendering backends.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("failed to read source `{path}`: {message}")]
    Read { path: PathBuf, message: String },
    #[error("syntax highlighting failed: {language}: {message}")]
    Highlighting { language: String, message: String },
    #[error("unsupported render option: {reason}")]
    Unsupported { reason: String },
    #[error("failed to prepare render workspace: {message}")]
    Workspace { message: String },
    #[error("headless browser `{cli_path}` unavailable: {message}")]
    BrowserUnavailable { cli_path: PathBuf, message: String },
    #[error("headless browser PDF export failed (exit {exit_code:?}): {stderr}")]
    Browser {
        exit_code: Option<i32>,
        stderr: String,
    },
    #[error("headless browser exited successfully but produced no PDF at `{path}`")]
    MissingOutput { path: PathBuf },
}

impl RenderError {
    pub(crate) fn workspace(err: io::Error) -> Self {
        Self::Workspace {
            message: err.to_string(),
        }
    }
}

/// Failure of [`RenderOrchestrator::prepare`](super::RenderOrchestrator::prepare).
#[derive(Debug, Error)]
pub enum PrepareError {
    #[error(transparent)]
    Access(#[from] AccessDenied),
    #[error("rendering `{path}` as {render_type} failed: {source}")]
    Render {
        path: PathBuf,
        render_type: RenderType,
        #[source]
        source: RenderError,
    },
}

/// External rendering capabilities. Each call writes a PDF into `out_dir`
/// and returns its path.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render_markdown(&self, source: &Path, out_dir: &Path) -> Result<PathBuf, RenderError>;

    async fn render_code(
        &self,
        source: &Path,
        options: &CodeRenderOptions,
        out_dir: &Path,
    ) -> Result<PathBuf, RenderError>;
}
