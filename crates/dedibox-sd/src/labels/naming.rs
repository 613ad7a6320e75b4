//! Label-name helpers.

/// Rewrite a label name so Prometheus accepts it (`[a-zA-Z_][a-zA-Z0-9_]*`).
///
/// Invalid characters become `_`; a leading digit gets a `_` prefix. Names that
/// are already valid come back unchanged.
pub fn sanitize_label_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 1);
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        out.push('_');
    }
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() || ch == '_' {
            out.push(ch);
        } else {
            out.push('_');
        }
    }
    out
}
