use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

use crate::application::render::RenderOverrides;

/// Command-line arguments for the printgate binary.
#[derive(Debug, Parser)]
#[command(
    name = "printgate",
    version,
    about = "Validate, render and spool files for printing"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "PRINTGATE_CONFIG_FILE",
        value_name = "PATH",
        global = true
    )]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: GlobalOverrides,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Check whether paths may be printed, without rendering them.
    Check(CheckArgs),
    /// Render one file and report its page and sheet count.
    Preview(PreviewArgs),
    /// Render and submit files to the print spooler.
    ///
    /// Exits with 1 if any file failed and 2 if any file needs confirmation.
    Print(PrintArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct GlobalOverrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Emit JSON formatted logs (true/false).
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub log_json: Option<bool>,

    /// Replace the allowed directories (comma separated).
    #[arg(
        long = "allowed-dirs",
        value_name = "DIRS",
        value_delimiter = ',',
        global = true
    )]
    pub allowed_dirs: Vec<String>,

    /// Replace the denied directories (comma separated).
    #[arg(
        long = "denied-dirs",
        value_name = "DIRS",
        value_delimiter = ',',
        global = true
    )]
    pub denied_dirs: Vec<String>,

    /// Print the original file when rendering fails (true/false).
    #[arg(
        long = "fallback-on-error",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub fallback_on_error: Option<bool>,

    /// Override the headless Chrome/Chromium executable.
    #[arg(
        long = "chrome-path",
        value_name = "PATH",
        value_hint = ValueHint::ExecutablePath,
        global = true
    )]
    pub chrome_path: Option<PathBuf>,

    /// Override the `lp` executable.
    #[arg(
        long = "lp-path",
        value_name = "PATH",
        value_hint = ValueHint::ExecutablePath,
        global = true
    )]
    pub lp_path: Option<PathBuf>,

    /// Sheets above which printing needs confirmation; 0 disables the check.
    #[arg(long = "confirm-threshold", value_name = "SHEETS", global = true)]
    pub confirm_threshold: Option<u32>,
}

#[derive(Debug, Args, Clone)]
pub struct CheckArgs {
    /// Paths to validate.
    #[arg(value_name = "PATH", required = true, value_hint = ValueHint::FilePath)]
    pub paths: Vec<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct RenderArgs {
    /// Show line numbers in code renders (true/false).
    #[arg(
        long = "line-numbers",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub line_numbers: Option<bool>,

    /// Syntax highlighting colour scheme.
    #[arg(long = "color-scheme", value_name = "NAME")]
    pub color_scheme: Option<String>,

    /// Code font size as a CSS length, e.g. `9pt`.
    #[arg(long = "font-size", value_name = "SIZE")]
    pub font_size: Option<String>,

    /// Code line height, e.g. `1.4`.
    #[arg(long = "line-spacing", value_name = "VALUE")]
    pub line_spacing: Option<String>,

    /// Render as markdown regardless of extension.
    #[arg(long = "markdown", action = clap::ArgAction::SetTrue, conflicts_with = "force_code")]
    pub force_markdown: bool,

    /// Render as highlighted code regardless of extension.
    #[arg(long = "code", action = clap::ArgAction::SetTrue)]
    pub force_code: bool,
}

impl From<&RenderArgs> for RenderOverrides {
    fn from(args: &RenderArgs) -> Self {
        RenderOverrides {
            line_numbers: args.line_numbers,
            color_scheme: args.color_scheme.clone(),
            font_size: args.font_size.clone(),
            line_spacing: args.line_spacing.clone(),
            force_markdown: args.force_markdown,
            force_code: args.force_code,
        }
    }
}

#[derive(Debug, Args, Clone)]
pub struct PreviewArgs {
    #[command(flatten)]
    pub render: RenderArgs,

    /// Count sheets for double-sided printing (true/false, bare flag means true).
    #[arg(
        long = "duplex",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    pub duplex: Option<bool>,

    /// File to preview.
    #[arg(value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub path: String,
}

#[derive(Debug, Args, Clone)]
pub struct PrintArgs {
    #[command(flatten)]
    pub render: RenderArgs,

    /// Print double-sided (true/false, bare flag means true).
    #[arg(
        long = "duplex",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    pub duplex: Option<bool>,

    /// Number of copies per file.
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub copies: u32,

    /// Destination printer; defaults to `print.printer`.
    #[arg(long, value_name = "NAME")]
    pub printer: Option<String>,

    /// Print even when a file exceeds the confirmation threshold.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub confirm: bool,

    /// Files to print, processed in order.
    #[arg(value_name = "PATH", required = true, value_hint = ValueHint::FilePath)]
    pub paths: Vec<String>,
}
