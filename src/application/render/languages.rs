//! Static lookup tables used to pick a render strategy from a file name.

use std::path::Path;

const MARKDOWN_EXTENSIONS: &[&str] = &["md", "markdown", "mdown", "mkd", "mkdn", "mdwn"];

/// Extension (or bare file name) to highlighting language token.
const CODE_LANGUAGES: &[(&str, &str)] = &[
    ("asm", "asm"),
    ("bash", "bash"),
    ("bat", "batch file"),
    ("c", "c"),
    ("cc", "c++"),
    ("cjs", "javascript"),
    ("clj", "clojure"),
    ("cmake", "cmake"),
    ("cmd", "batch file"),
    ("cpp", "c++"),
    ("cs", "c#"),
    ("css", "css"),
    ("cxx", "c++"),
    ("dart", "dart"),
    ("diff", "diff"),
    ("dockerfile", "dockerfile"),
    ("erl", "erlang"),
    ("ex", "elixir"),
    ("exs", "elixir"),
    ("fish", "fish"),
    ("go", "go"),
    ("gradle", "groovy"),
    ("graphql", "graphql"),
    ("groovy", "groovy"),
    ("h", "c"),
    ("hh", "c++"),
    ("hpp", "c++"),
    ("hs", "haskell"),
    ("htm", "html"),
    ("html", "html"),
    ("ini", "ini"),
    ("java", "java"),
    ("jl", "julia"),
    ("js", "javascript"),
    ("json", "json"),
    ("jsx", "javascript"),
    ("kt", "kotlin"),
    ("kts", "kotlin"),
    ("less", "less"),
    ("lua", "lua"),
    ("makefile", "makefile"),
    ("mjs", "javascript"),
    ("mk", "makefile"),
    ("ml", "ocaml"),
    ("nim", "nim"),
    ("patch", "diff"),
    ("php", "php"),
    ("pl", "perl"),
    ("pm", "perl"),
    ("proto", "protobuf"),
    ("ps1", "powershell"),
    ("py", "python"),
    ("pyw", "python"),
    ("r", "r"),
    ("rb", "ruby"),
    ("rs", "rust"),
    ("sass", "sass"),
    ("scala", "scala"),
    ("scss", "scss"),
    ("sh", "bash"),
    ("sql", "sql"),
    ("swift", "swift"),
    ("tex", "latex"),
    ("tf", "terraform"),
    ("toml", "toml"),
    ("ts", "typescript"),
    ("tsx", "typescriptreact"),
    ("vue", "vue"),
    ("xml", "xml"),
    ("yaml", "yaml"),
    ("yml", "yaml"),
    ("zig", "zig"),
    ("zsh", "bash"),
];

/// Lowercased extension, or the lowercased file name when there is none
/// (`Makefile`, `Dockerfile`).
pub(crate) fn extension_key(path: &Path) -> Option<String> {
    path.extension()
        .or_else(|| path.file_name())
        .and_then(|value| value.to_str())
        .map(str::to_ascii_lowercase)
}

pub(crate) fn is_markdown_extension(key: &str) -> bool {
    MARKDOWN_EXTENSIONS.contains(&key)
}

pub(crate) fn language_for_extension(key: &str) -> Option<&'static str> {
    CODE_LANGUAGES
        .binary_search_by(|(ext, _)| (*ext).cmp(key))
        .ok()
        .map(|idx| CODE_LANGUAGES[idx].1)
}

/// Normalise a configured extension: trims, drops a leading `.`, lowercases.
pub(crate) fn normalize_extension(raw: &str) -> String {
    raw.trim().trim_start_matches('.').to_ascii_lowercase()
}
