use syntect::{
    highlighting::ThemeSet,
    html::{ClassStyle, ClassedHTMLGenerator, css_for_theme_with_class_style},
    parsing::{SyntaxReference, SyntaxSet},
    util::LinesWithEndings,
};

use crate::application::render::types::{CodeRenderOptions, RenderError};

use super::balance::balance;

pub(crate) const CLASS_STYLE: ClassStyle = ClassStyle::SpacedPrefixed { prefix: "syntax-" };

/// Build a standalone, line-numbered HTML page for `code`.
pub(crate) fn code_document(
    title: &str,
    code: &str,
    extension: Option<&str>,
    options: &CodeRenderOptions,
    syntax_set: &SyntaxSet,
    theme_set: &ThemeSet,
) -> Result<String, RenderError> {
    let theme_css = theme_css(&options.color_scheme, theme_set)?;
    let rows = highlight_rows(&options.language, extension, code, syntax_set)?;

    let mut table = String::with_capacity(rows.iter().map(String::len).sum::<usize>() * 2);
    for (index, row) in rows.iter().enumerate() {
        table.push_str("<tr>");
        if options.line_numbers {
            table.push_str(&format!("<td class=\"ln\">{}</td>", index + 1));
        }
        table.push_str("<td class=\"code\">");
        table.push_str(row);
        table.push_str("</td></tr>\n");
    }

    Ok(format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{title}</title>
<style>
@page {{ margin: 12mm; }}
body {{ margin: 0; font-family: "DejaVu Sans Mono", "Menlo", "Consolas", monospace; font-size: {font_size}; line-height: {line_spacing}; }}
h1.file {{ font-size: 1.1em; margin: 0 0 0.8em 0; font-family: sans-serif; }}
table.code-table {{ border-collapse: collapse; width: 100%; }}
td {{ vertical-align: top; padding: 0; }}
td.ln {{ color: #8a8a8a; text-align: right; padding-right: 1em; user-select: none; white-space: nowrap; width: 1%; }}
td.code {{ white-space: pre-wrap; word-break: break-all; tab-size: 4; }}
td.code::before {{ content: "\200B"; }}
tr {{ break-inside: avoid; }}
{theme_css}
</style>
</head>
<body class="syntax-code">
<h1 class="file">{title}</h1>
<table class="code-table">
{table}</table>
</body>
</html>
"#,
        title = ammonia::clean_text(title),
        font_size = css_value(&options.font_size),
        line_spacing = css_value(&options.line_spacing),
    ))
}

fn theme_css(name: &str, theme_set: &ThemeSet) -> Result<String, RenderError> {
    let theme = theme_set.themes.get(name).ok_or_else(|| {
        let mut available: Vec<&str> = theme_set.themes.keys().map(String::as_str).collect();
        available.sort_unstable();
        RenderError::Unsupported {
            reason: format!(
                "unknown color scheme `{name}`; available: {}",
                available.join(", ")
            ),
        }
    })?;

    css_for_theme_with_class_style(theme, CLASS_STYLE).map_err(|err| RenderError::Unsupported {
        reason: format!("color scheme `{name}` cannot be rendered: {err}"),
    })
}

/// Highlight `code` and return one balanced HTML fragment per source line.
pub(crate) fn highlight_rows(
    language: &str,
    extension: Option<&str>,
    code: &str,
    syntax_set: &SyntaxSet,
) -> Result<Vec<String>, RenderError> {
    let syntax = find_syntax(syntax_set, language)
        .or_else(|| extension.and_then(|ext| find_syntax(syntax_set, ext)))
        .unwrap_or_else(|| syntax_set.find_syntax_plain_text());

    let mut normalized = code.replace("\r\n", "\n");
    if !normalized.ends_with('\n') {
        normalized.push('\n');
    }
    let line_count = normalized.matches('\n').count();

    let mut generator = ClassedHTMLGenerator::new_with_class_style(syntax, syntax_set, CLASS_STYLE);
    for line in LinesWithEndings::from(normalized.as_str()) {
        generator
            .parse_html_for_line_which_includes_newline(line)
            .map_err(|err| RenderError::Highlighting {
                language: language.to_string(),
                message: err.to_string(),
            })?;
    }

    let highlighted = generator.finalize();
    // Past the final newline only the generator's closing tags remain.
    Ok(balance(&highlighted)
        .split('\n')
        .take(line_count)
        .map(str::to_string)
        .collect())
}

fn find_syntax<'a>(syntax_set: &'a SyntaxSet, token: &str) -> Option<&'a SyntaxReference> {
    let lowercase = token.to_ascii_lowercase();
    syntax_set
        .find_syntax_by_token(&lowercase)
        .or_else(|| syntax_set.find_syntax_by_name(token))
        .or_else(|| syntax_set.find_syntax_by_extension(&lowercase))
}

/// Strip characters that could break out of a CSS declaration.
fn css_value(value: &str) -> String {
    value
        .chars()
        .filter(|ch| !matches!(ch, ';' | '{' | '}' | '<' | '>' | '"' | '\'' | '\\'))
        .collect()
}
