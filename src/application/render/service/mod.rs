mod balance;
mod chrome;
mod config;
mod highlight;
mod markdown;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use once_cell::sync::Lazy;
use syntect::{dumps::from_uncompressed_data, highlighting::ThemeSet, parsing::SyntaxSet};

use crate::application::render::{
    languages::extension_key,
    types::{CodeRenderOptions, RenderError, Renderer},
};

pub use balance::balance;
pub use chrome::ChromePdf;

use self::config::{build_markdown_sanitizer, default_options};
use highlight::code_document;
use markdown::markdown_document;

static SYNTAX_SET: Lazy<SyntaxSet> = Lazy::new(|| {
    let syntax_bytes = include_bytes!(env!("SYNTAX_PACK_FILE"));
    from_uncompressed_data(syntax_bytes).expect("syntax pack must be valid")
});

static THEME_SET: Lazy<ThemeSet> = Lazy::new(ThemeSet::load_defaults);

/// Syntax definitions compiled into the binary by the build script.
pub(crate) fn bundled_syntax_set() -> &'static SyntaxSet {
    &SYNTAX_SET
}

/// Bundled colour schemes accepted by `render.color_scheme`.
pub fn bundled_theme_set() -> &'static ThemeSet {
    &THEME_SET
}

/// Comrak + Syntect HTML generation, printed to PDF by headless Chrome.
pub struct ChromeRenderService {
    options: comrak::Options<'static>,
    sanitizer: ammonia::Builder<'static>,
    syntax_set: &'static SyntaxSet,
    theme_set: &'static ThemeSet,
    chrome: ChromePdf,
}

impl ChromeRenderService {
    pub fn new(chrome_path: PathBuf) -> Self {
        Self {
            options: default_options(),
            sanitizer: build_markdown_sanitizer(),
            syntax_set: bundled_syntax_set(),
            theme_set: bundled_theme_set(),
            chrome: ChromePdf::new(chrome_path),
        }
    }

    /// Markdown source to a standalone HTML document.
    pub fn markdown_html(&self, title: &str, markdown: &str) -> String {
        markdown_document(title, markdown, &self.options, &self.sanitizer)
    }

    /// Source code to a standalone, highlighted HTML document.
    pub fn code_html(
        &self,
        title: &str,
        code: &str,
        extension: Option<&str>,
        options: &CodeRenderOptions,
    ) -> Result<String, RenderError> {
        code_document(
            title,
            code,
            extension,
            options,
            self.syntax_set,
            self.theme_set,
        )
    }
}

#[async_trait]
impl Renderer for ChromeRenderService {
    async fn render_markdown(&self, source: &Path, out_dir: &Path) -> Result<PathBuf, RenderError> {
        let markdown = read_source(source).await?;
        let html = self.markdown_html(&display_title(source), &markdown);
        self.chrome.print_to_pdf(&html, out_dir).await
    }

    async fn render_code(
        &self,
        source: &Path,
        options: &CodeRenderOptions,
        out_dir: &Path,
    ) -> Result<PathBuf, RenderError> {
        let code = read_source(source).await?;
        let extension = extension_key(source);
        let html = self.code_html(
            &display_title(source),
            &code,
            extension.as_deref(),
            options,
        )?;
        self.chrome.print_to_pdf(&html, out_dir).await
    }
}

async fn read_source(path: &Path) -> Result<String, RenderError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|err| RenderError::Read {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
    Ok(match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
    })
}

fn display_title(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
