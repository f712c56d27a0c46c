//! Identity key used to bucket catalog entries.
//!
//! The key is a hint only: search always scores every entry, so two
//! near-identical shots whose keys differ still compete.

/// Composite key of maker, model, lens, focal length and aperture.
///
/// Text fields are separated by `|`; a literal `|` or `\` inside a field
/// is backslash-escaped so distinct inputs cannot collide. Numbers use one
/// decimal.
pub fn identity_key(maker: &str, model: &str, lens: &str, focal_length: f64, aperture: f64) -> String {
    format!(
        "{}|{}|{}|{:.1}mm|f/{:.1}",
        escape(maker),
        escape(model),
        escape(lens),
        focal_length,
        aperture
    )
}

fn escape(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    for c in field.chars() {
        if c == '|' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
