//! Brand-name normalization for style labels and variation names.

/// Every user-visible design name starts with this exact token.
pub const BRAND_PREFIX: &str = "AiSim ";

/// Trim `name` and make it start with [`BRAND_PREFIX`] exactly once.
///
/// Repeated leading prefixes collapse to one. The check is case-sensitive:
/// `"aisim Foo"` becomes `"AiSim aisim Foo"`.
pub fn ensure_brand_prefix(name: &str) -> String {
    let mut rest = name.trim();
    while let Some(stripped) = rest.strip_prefix(BRAND_PREFIX) {
        rest = stripped.trim_start();
    }
    format!("{BRAND_PREFIX}{rest}")
}
