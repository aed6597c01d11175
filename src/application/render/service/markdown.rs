use ammonia::Builder as AmmoniaBuilder;
use comrak::{Options, markdown_to_html};

const MARKDOWN_CSS: &str = r#"
@page { margin: 18mm 16mm; }
body { font-family: "DejaVu Sans", "Helvetica Neue", Arial, sans-serif; font-size: 11pt; line-height: 1.5; color: #1f2328; }
h1, h2, h3, h4, h5, h6 { line-height: 1.25; margin: 1.2em 0 0.5em; break-after: avoid; }
h1 { font-size: 1.8em; border-bottom: 1px solid #d0d7de; padding-bottom: 0.2em; }
h2 { font-size: 1.4em; border-bottom: 1px solid #d0d7de; padding-bottom: 0.2em; }
p, ul, ol, table, pre, blockquote { margin: 0 0 0.9em; }
code { font-family: "DejaVu Sans Mono", Menlo, Consolas, monospace; font-size: 0.9em; background: #f6f8fa; padding: 0.1em 0.3em; border-radius: 3px; }
pre { background: #f6f8fa; padding: 0.8em; border-radius: 4px; white-space: pre-wrap; word-break: break-all; }
pre code { background: none; padding: 0; }
blockquote { border-left: 3px solid #d0d7de; padding-left: 0.9em; color: #57606a; }
table { border-collapse: collapse; }
th, td { border: 1px solid #d0d7de; padding: 0.3em 0.6em; }
img { max-width: 100%; }
tr, img, pre { break-inside: avoid; }
"#;

/// Render markdown into a standalone, print-styled HTML page.
pub(crate) fn markdown_document(
    title: &str,
    markdown: &str,
    options: &Options<'static>,
    sanitizer: &AmmoniaBuilder<'static>,
) -> String {
    let body = sanitizer.clean(&markdown_to_html(markdown, options)).to_string();
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{title}</title>\n<style>{MARKDOWN_CSS}</style>\n</head>\n<body>\n{body}</body>\n</html>\n",
        title = ammonia::clean_text(title),
    )
}
