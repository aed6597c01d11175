//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

use std::{
    env,
    path::{Path, PathBuf},
    str::FromStr,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::application::render::{RenderConfig, bundled_theme_set, normalize_extension};
use crate::domain::sheets::ConfirmationThreshold;

pub use cli::{CheckArgs, CliArgs, Command, GlobalOverrides, PreviewArgs, PrintArgs, RenderArgs};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "printgate";
const ENV_PREFIX: &str = "PRINTGATE";
const DEFAULT_DENIED_DIRS: &[&str] = &["/etc", "/proc", "/sys", "/dev", "/boot"];
const DEFAULT_CHROME_PATH: &str = "chromium";
const DEFAULT_LP_PATH: &str = "lp";
const DEFAULT_CONFIRM_THRESHOLD: u32 = 10;

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub access: AccessSettings,
    pub render: RenderSettings,
    pub print: PrintSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessSettings {
    pub allowed_dirs: Vec<PathBuf>,
    pub denied_dirs: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderSettings {
    pub config: RenderConfig,
    pub chrome_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintSettings {
    pub confirm_threshold: ConfirmationThreshold,
    pub duplex: bool,
    pub printer: Option<String>,
    pub lp_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("access.allowed_dirs")
            .with_list_parse_key("access.denied_dirs")
            .with_list_parse_key("render.code_exclude_extensions")
            .try_parsing(true),
    );

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_overrides(&cli.overrides);

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    access: RawAccessSettings,
    render: RawRenderSettings,
    print: RawPrintSettings,
    logging: RawLoggingSettings,
}

impl RawSettings {
    fn apply_overrides(&mut self, overrides: &GlobalOverrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if !overrides.allowed_dirs.is_empty() {
            self.access.allowed_dirs = Some(overrides.allowed_dirs.clone());
        }
        if !overrides.denied_dirs.is_empty() {
            self.access.denied_dirs = Some(overrides.denied_dirs.clone());
        }
        if let Some(fallback) = overrides.fallback_on_error {
            self.render.fallback_on_error = Some(fallback);
        }
        if let Some(path) = overrides.chrome_path.as_ref() {
            self.render.chrome_path = Some(path.clone());
        }
        if let Some(path) = overrides.lp_path.as_ref() {
            self.print.lp_path = Some(path.clone());
        }
        if let Some(threshold) = overrides.confirm_threshold {
            self.print.confirm_threshold = Some(threshold);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        Self::resolve(raw, env::var_os("HOME").map(PathBuf::from))
    }

    fn resolve(raw: RawSettings, home: Option<PathBuf>) -> Result<Self, LoadError> {
        let RawSettings {
            access,
            render,
            print,
            logging,
        } = raw;

        let access = build_access_settings(access, home.as_deref())?;
        let render = build_render_settings(render)?;
        let print = build_print_settings(print)?;
        let logging = build_logging_settings(logging)?;

        Ok(Self {
            access,
            render,
            print,
            logging,
        })
    }
}

fn build_access_settings(
    access: RawAccessSettings,
    home: Option<&Path>,
) -> Result<AccessSettings, LoadError> {
    let allowed_dirs = match access.allowed_dirs {
        Some(entries) => resolve_dirs(&entries, home, "access.allowed_dirs")?,
        None => home.map(Path::to_path_buf).into_iter().collect(),
    };

    let denied_dirs = match access.denied_dirs {
        Some(entries) => resolve_dirs(&entries, home, "access.denied_dirs")?,
        None => DEFAULT_DENIED_DIRS.iter().map(PathBuf::from).collect(),
    };

    Ok(AccessSettings {
        allowed_dirs,
        denied_dirs,
    })
}

fn resolve_dirs(
    entries: &[String],
    home: Option<&Path>,
    key: &'static str,
) -> Result<Vec<PathBuf>, LoadError> {
    entries
        .iter()
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let path = expand_home(entry, home).ok_or_else(|| {
                LoadError::invalid(key, format!("cannot expand `{entry}`: HOME is not set"))
            })?;
            if path.is_absolute() {
                Ok(path)
            } else {
                Err(LoadError::invalid(
                    key,
                    format!("`{entry}` must be an absolute path"),
                ))
            }
        })
        .collect()
}

/// Expand a leading `~` or `~/`. Returns `None` when expansion is needed but
/// no home directory is known.
fn expand_home(entry: &str, home: Option<&Path>) -> Option<PathBuf> {
    if entry == "~" {
        return home.map(Path::to_path_buf);
    }
    match entry.strip_prefix("~/") {
        Some(rest) => home.map(|home| home.join(rest)),
        None => Some(PathBuf::from(entry)),
    }
}

fn build_render_settings(render: RawRenderSettings) -> Result<RenderSettings, LoadError> {
    let defaults = RenderConfig::default();

    let color_scheme = render.color_scheme.unwrap_or(defaults.color_scheme);
    if !bundled_theme_set().themes.contains_key(&color_scheme) {
        let mut available: Vec<&str> = bundled_theme_set()
            .themes
            .keys()
            .map(String::as_str)
            .collect();
        available.sort_unstable();
        return Err(LoadError::invalid(
            "render.color_scheme",
            format!(
                "unknown scheme `{color_scheme}`; available: {}",
                available.join(", ")
            ),
        ));
    }

    let font_size = non_empty(render.font_size, defaults.font_size, "render.font_size")?;
    let line_spacing = non_empty(
        render.line_spacing,
        defaults.line_spacing,
        "render.line_spacing",
    )?;

    let chrome_path = render
        .chrome_path
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CHROME_PATH));
    if chrome_path.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "render.chrome_path",
            "path must not be empty",
        ));
    }

    let mut code_exclude_extensions: Vec<String> = render
        .code_exclude_extensions
        .unwrap_or_default()
        .iter()
        .map(|ext| normalize_extension(ext))
        .filter(|ext| !ext.is_empty())
        .collect();
    code_exclude_extensions.sort();
    code_exclude_extensions.dedup();

    Ok(RenderSettings {
        config: RenderConfig {
            auto_markdown: render.auto_markdown.unwrap_or(defaults.auto_markdown),
            auto_code: render.auto_code.unwrap_or(defaults.auto_code),
            code_exclude_extensions,
            fallback_on_error: render
                .fallback_on_error
                .unwrap_or(defaults.fallback_on_error),
            line_numbers: render.line_numbers.unwrap_or(defaults.line_numbers),
            color_scheme,
            font_size,
            line_spacing,
        },
        chrome_path,
    })
}

fn build_print_settings(print: RawPrintSettings) -> Result<PrintSettings, LoadError> {
    let lp_path = print
        .lp_path
        .unwrap_or_else(|| PathBuf::from(DEFAULT_LP_PATH));
    if lp_path.as_os_str().is_empty() {
        return Err(LoadError::invalid("print.lp_path", "path must not be empty"));
    }

    let printer = print.printer.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });

    Ok(PrintSettings {
        confirm_threshold: ConfirmationThreshold::new(
            print.confirm_threshold.unwrap_or(DEFAULT_CONFIRM_THRESHOLD),
        ),
        duplex: print.duplex.unwrap_or(false),
        printer,
        lp_path,
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn non_empty(
    value: Option<String>,
    default: String,
    key: &'static str,
) -> Result<String, LoadError> {
    match value {
        None => Ok(default),
        Some(value) if value.trim().is_empty() => {
            Err(LoadError::invalid(key, "value must not be empty"))
        }
        Some(value) => Ok(value.trim().to_string()),
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawAccessSettings {
    allowed_dirs: Option<Vec<String>>,
    denied_dirs: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRenderSettings {
    auto_markdown: Option<bool>,
    auto_code: Option<bool>,
    code_exclude_extensions: Option<Vec<String>>,
    fallback_on_error: Option<bool>,
    line_numbers: Option<bool>,
    color_scheme: Option<String>,
    font_size: Option<String>,
    line_spacing: Option<String>,
    chrome_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawPrintSettings {
    confirm_threshold: Option<u32>,
    duplex: Option<bool>,
    printer: Option<String>,
    lp_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}
