use std::{path::Path, sync::Arc, time::Instant};

use tracing::{info, warn};

use crate::domain::access::AccessPolicy;

use super::languages::{extension_key, is_markdown_extension, language_for_extension};
use super::types::{
    CodeRenderOptions, PrepareError, RenderConfig, RenderError, RenderOutcome, RenderSpec,
    RenderType, Renderer,
};

/// Language token used when code rendering is forced for an unknown extension.
const PLAIN_TEXT_LANGUAGE: &str = "text";

/// Validates, classifies and renders one file into a printable artifact.
#[derive(Clone)]
pub struct RenderOrchestrator {
    policy: Arc<AccessPolicy>,
    config: RenderConfig,
    renderer: Arc<dyn Renderer>,
}

impl RenderOrchestrator {
    pub fn new(
        policy: Arc<AccessPolicy>,
        config: RenderConfig,
        renderer: Arc<dyn Renderer>,
    ) -> Self {
        Self {
            policy,
            config,
            renderer,
        }
    }

    /// Render type chosen for an already validated path.
    pub fn select_render_type(&self, path: &Path, spec: &RenderSpec) -> RenderType {
        let key = extension_key(path);
        let key = key.as_deref().unwrap_or_default();

        if spec.overrides.force_markdown
            || (self.config.auto_markdown && is_markdown_extension(key))
        {
            return RenderType::Markdown;
        }

        let auto_code = self.config.auto_code
            && language_for_extension(key).is_some()
            && !self
                .config
                .code_exclude_extensions
                .iter()
                .any(|excluded| excluded == key);
        if spec.overrides.force_code || auto_code {
            return RenderType::Code;
        }

        RenderType::None
    }

    /// Resolve code options: per-call overrides first, configuration otherwise.
    pub fn code_options(&self, path: &Path, spec: &RenderSpec) -> CodeRenderOptions {
        let overrides = &spec.overrides;
        let language = extension_key(path)
            .as_deref()
            .and_then(language_for_extension)
            .unwrap_or(PLAIN_TEXT_LANGUAGE)
            .to_string();

        CodeRenderOptions {
            language,
            line_numbers: overrides.line_numbers.unwrap_or(self.config.line_numbers),
            color_scheme: overrides
                .color_scheme
                .clone()
                .unwrap_or_else(|| self.config.color_scheme.clone()),
            font_size: overrides
                .font_size
                .clone()
                .unwrap_or_else(|| self.config.font_size.clone()),
            line_spacing: overrides
                .line_spacing
                .clone()
                .unwrap_or_else(|| self.config.line_spacing.clone()),
        }
    }

    /// Validate `spec.path` and produce the artifact to print.
    ///
    /// Access denial is returned before any rendering happens. Render
    /// failures are fatal unless `fallback_on_error` is set, in which case
    /// the original file is returned together with the failure.
    pub async fn prepare(&self, spec: &RenderSpec) -> Result<RenderOutcome, PrepareError> {
        let path = self.policy.authorize(&spec.path)?;
        let render_type = self.select_render_type(&path, spec);

        if render_type == RenderType::None {
            metrics::counter!("printgate_render_total", "type" => "none", "result" => "ok")
                .increment(1);
            return Ok(RenderOutcome::original(path));
        }

        let started_at = Instant::now();
        match self.render(&path, spec, render_type).await {
            Ok(outcome) => {
                metrics::counter!(
                    "printgate_render_total",
                    "type" => render_type.as_str(),
                    "result" => "ok"
                )
                .increment(1);
                info!(
                    target = "application::render::orchestrator",
                    op = "prepare",
                    result = "ok",
                    render_type = render_type.as_str(),
                    elapsed_ms = started_at.elapsed().as_millis() as u64,
                    path = %path.display(),
                    artifact = %outcome.artifact_path().display(),
                    "Rendered file for printing"
                );
                Ok(outcome)
            }
            Err(err) if self.config.fallback_on_error => {
                metrics::counter!(
                    "printgate_render_total",
                    "type" => render_type.as_str(),
                    "result" => "fallback"
                )
                .increment(1);
                warn!(
                    target = "application::render::orchestrator",
                    op = "prepare",
                    result = "fallback",
                    render_type = render_type.as_str(),
                    elapsed_ms = started_at.elapsed().as_millis() as u64,
                    path = %path.display(),
                    error = %err,
                    "Render failed; substituting original file"
                );
                Ok(RenderOutcome::fallback(path, err))
            }
            Err(err) => {
                metrics::counter!(
                    "printgate_render_total",
                    "type" => render_type.as_str(),
                    "result" => "error"
                )
                .increment(1);
                warn!(
                    target = "application::render::orchestrator",
                    op = "prepare",
                    result = "error",
                    render_type = render_type.as_str(),
                    elapsed_ms = started_at.elapsed().as_millis() as u64,
                    path = %path.display(),
                    error = %err,
                    "Render failed"
                );
                Err(PrepareError::Render {
                    path,
                    render_type,
                    source: err,
                })
            }
        }
    }

    async fn render(
        &self,
        path: &Path,
        spec: &RenderSpec,
        render_type: RenderType,
    ) -> Result<RenderOutcome, RenderError> {
        let dir = tempfile::Builder::new()
            .prefix("printgate-render-")
            .tempdir()
            .map_err(RenderError::workspace)?;

        // On error `dir` is dropped here, removing anything the renderer wrote.
        let artifact = match render_type {
            RenderType::Markdown => self.renderer.render_markdown(path, dir.path()).await?,
            RenderType::Code => {
                let options = self.code_options(path, spec);
                self.renderer
                    .render_code(path, &options, dir.path())
                    .await?
            }
            RenderType::None => return Ok(RenderOutcome::original(path.to_path_buf())),
        };

        Ok(RenderOutcome::rendered(artifact, dir, render_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::render::types::RenderOverrides;
    use crate::domain::access::DenyReason;
    use async_trait::async_trait;
    use std::{fs, path::PathBuf, sync::Mutex};
    use tempfile::TempDir;

    #[derive(Default)]
    struct FakeRenderer {
        fail: bool,
        calls: Mutex<Vec<(RenderType, Option<CodeRenderOptions>)>>,
        out_dirs: Mutex<Vec<PathBuf>>,
    }

    impl FakeRenderer {
        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        fn write_pdf(&self, out_dir: &Path) -> Result<PathBuf, RenderError> {
            self.out_dirs.lock().unwrap().push(out_dir.to_path_buf());
            let pdf = out_dir.join("document.pdf");
            fs::write(&pdf, b"%PDF-1.4 fake").unwrap();
            if self.fail {
                return Err(RenderError::Browser {
                    exit_code: Some(1),
                    stderr: "boom".to_string(),
                });
            }
            Ok(pdf)
        }
    }

    #[async_trait]
    impl Renderer for FakeRenderer {
        async fn render_markdown(
            &self,
            _source: &Path,
            out_dir: &Path,
        ) -> Result<PathBuf, RenderError> {
            self.calls.lock().unwrap().push((RenderType::Markdown, None));
            self.write_pdf(out_dir)
        }

        async fn render_code(
            &self,
            _source: &Path,
            options: &CodeRenderOptions,
            out_dir: &Path,
        ) -> Result<PathBuf, RenderError> {
            self.calls
                .lock()
                .unwrap()
                .push((RenderType::Code, Some(options.clone())));
            self.write_pdf(out_dir)
        }
    }

    struct Fixture {
        root: TempDir,
        renderer: Arc<FakeRenderer>,
        orchestrator: RenderOrchestrator,
    }

    impl Fixture {
        fn path(&self, name: &str) -> String {
            let path = self.root.path().join(name);
            fs::write(&path, "content\n").unwrap();
            path.to_string_lossy().into_owned()
        }
    }

    fn fixture_with(config: RenderConfig, renderer: FakeRenderer) -> Fixture {
        let root = tempfile::Builder::new()
            .prefix("printgate-orchestrator")
            .tempdir()
            .unwrap();
        let policy = AccessPolicy::new(vec![root.path().to_path_buf()], Vec::new());
        let renderer = Arc::new(renderer);
        let orchestrator = RenderOrchestrator::new(
            Arc::new(policy),
            config,
            renderer.clone() as Arc<dyn Renderer>,
        );
        Fixture {
            root,
            renderer,
            orchestrator,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(RenderConfig::default(), FakeRenderer::default())
    }

    #[tokio::test]
    async fn plain_files_pass_through() {
        let fx = fixture();
        let path = fx.path("scan.pdf");

        let outcome = fx.orchestrator.prepare(&RenderSpec::new(&path)).await.unwrap();

        assert_eq!(outcome.render_type(), RenderType::None);
        assert!(!outcome.is_temporary());
        assert_eq!(
            outcome.artifact_path(),
            fs::canonicalize(&path).unwrap().as_path()
        );
        assert!(fx.renderer.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn markdown_extension_renders_markdown() {
        let fx = fixture();
        let outcome = fx
            .orchestrator
            .prepare(&RenderSpec::new(fx.path("README.MD")))
            .await
            .unwrap();

        assert_eq!(outcome.render_type(), RenderType::Markdown);
        assert!(outcome.is_temporary());
        assert!(outcome.artifact_path().exists());
    }

    #[tokio::test]
    async fn code_uses_configuration_defaults_and_overrides() {
        let fx = fixture();
        let spec = RenderSpec::new(fx.path("main.py")).with_overrides(RenderOverrides {
            line_numbers: Some(false),
            font_size: Some("8pt".to_string()),
            ..RenderOverrides::default()
        });

        let outcome = fx.orchestrator.prepare(&spec).await.unwrap();
        assert_eq!(outcome.render_type(), RenderType::Code);

        let calls = fx.renderer.calls.lock().unwrap();
        let options = calls[0].1.as_ref().unwrap();
        assert_eq!(options.language, "python");
        assert!(!options.line_numbers);
        assert_eq!(options.font_size, "8pt");
        assert_eq!(options.color_scheme, "InspiredGitHub");
        assert_eq!(options.line_spacing, "1.5");
    }

    #[tokio::test]
    async fn excluded_and_disabled_code_is_not_rendered() {
        let config = RenderConfig {
            code_exclude_extensions: vec!["json".to_string()],
            ..RenderConfig::default()
        };
        let fx = fixture_with(config, FakeRenderer::default());
        let outcome = fx
            .orchestrator
            .prepare(&RenderSpec::new(fx.path("data.json")))
            .await
            .unwrap();
        assert_eq!(outcome.render_type(), RenderType::None);

        let config = RenderConfig {
            auto_code: false,
            auto_markdown: false,
            ..RenderConfig::default()
        };
        let fx = fixture_with(config, FakeRenderer::default());
        for name in ["main.rs", "notes.md"] {
            let outcome = fx
                .orchestrator
                .prepare(&RenderSpec::new(fx.path(name)))
                .await
                .unwrap();
            assert_eq!(outcome.render_type(), RenderType::None, "{name}");
        }
    }

    #[tokio::test]
    async fn force_flags_override_detection() {
        let config = RenderConfig {
            auto_code: false,
            auto_markdown: false,
            ..RenderConfig::default()
        };
        let fx = fixture_with(config, FakeRenderer::default());

        let forced_md = RenderSpec::new(fx.path("notes.txt")).with_overrides(RenderOverrides {
            force_markdown: true,
            ..RenderOverrides::default()
        });
        let outcome = fx.orchestrator.prepare(&forced_md).await.unwrap();
        assert_eq!(outcome.render_type(), RenderType::Markdown);

        let forced_code = RenderSpec::new(fx.path("notes.log")).with_overrides(RenderOverrides {
            force_code: true,
            ..RenderOverrides::default()
        });
        let outcome = fx.orchestrator.prepare(&forced_code).await.unwrap();
        assert_eq!(outcome.render_type(), RenderType::Code);
        let calls = fx.renderer.calls.lock().unwrap();
        assert_eq!(calls[1].1.as_ref().unwrap().language, PLAIN_TEXT_LANGUAGE);
    }

    #[tokio::test]
    async fn denial_happens_before_rendering() {
        let fx = fixture();
        let hidden = fx.root.path().join(".env.md");
        fs::write(&hidden, "SECRET=1").unwrap();

        let err = fx
            .orchestrator
            .prepare(&RenderSpec::new(hidden.to_string_lossy()))
            .await
            .unwrap_err();

        match err {
            PrepareError::Access(denied) => {
                assert_eq!(denied.reason, DenyReason::DotfileBlocked)
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(fx.renderer.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn render_failure_is_fatal_without_fallback() {
        let fx = fixture_with(RenderConfig::default(), FakeRenderer::failing());
        let err = fx
            .orchestrator
            .prepare(&RenderSpec::new(fx.path("main.go")))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PrepareError::Render {
                render_type: RenderType::Code,
                ..
            }
        ));
        let out_dir = fx.renderer.out_dirs.lock().unwrap()[0].clone();
        assert!(!out_dir.exists(), "temporary directory leaked");
    }

    #[tokio::test]
    async fn render_failure_falls_back_to_original_when_enabled() {
        let config = RenderConfig {
            fallback_on_error: true,
            ..RenderConfig::default()
        };
        let fx = fixture_with(config, FakeRenderer::failing());
        let path = fx.path("main.go");

        let outcome = fx.orchestrator.prepare(&RenderSpec::new(&path)).await.unwrap();

        assert_eq!(outcome.render_type(), RenderType::None);
        assert!(!outcome.is_temporary());
        assert!(matches!(
            outcome.fallback_reason(),
            Some(RenderError::Browser { .. })
        ));
        assert_eq!(
            outcome.artifact_path(),
            fs::canonicalize(&path).unwrap().as_path()
        );
    }

    #[tokio::test]
    async fn cleanup_removes_temporary_artifact() {
        let fx = fixture();
        let outcome = fx
            .orchestrator
            .prepare(&RenderSpec::new(fx.path("lib.rs")))
            .await
            .unwrap();
        let artifact = outcome.artifact_path().to_path_buf();
        assert!(artifact.exists());

        outcome.cleanup().unwrap();
        assert!(!artifact.exists());
        assert!(!artifact.parent().unwrap().exists());
    }

    #[tokio::test]
    async fn dropping_outcome_removes_temporary_artifact() {
        let fx = fixture();
        let outcome = fx
            .orchestrator
            .prepare(&RenderSpec::new(fx.path("notes.md")))
            .await
            .unwrap();
        let artifact = outcome.artifact_path().to_path_buf();
        drop(outcome);
        assert!(!artifact.exists());
    }
}
