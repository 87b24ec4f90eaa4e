//! Small text helpers shared by the LookML renderers

/// Prefix every non-blank line of `text` with `prefix`.
pub(crate) fn indent(text: &str, prefix: &str) -> String {
    text.split_inclusive('\n')
        .map(|line| {
            if line.trim().is_empty() {
                line.to_string()
            } else {
                format!("{prefix}{line}")
            }
        })
        .collect()
}

/// Double-quoted LookML string; embedded double quotes become single quotes.
pub(crate) fn quoted(text: &str) -> String {
    format!("\"{}\"", text.replace('"', "'"))
}

/// `<keyword>: <name> { ... }` with a two-space indented body.
pub(crate) fn block(keyword: &str, name: &str, body: &[String]) -> String {
    format!("{keyword}: {name} {{\n{}\n}}", indent(&body.join("\n"), "  "))
}
