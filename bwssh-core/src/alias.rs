//! Alias derivation.
//!
//! Converts agent key comments to names that are safe both as `Host`
//! aliases and as `.pub` filename stems.

/// Derive the config/filesystem alias for a key comment.
///
/// Rules:
/// - Lowercased
/// - Each of `/ : \ * ? " < > |` replaced with `_`
///
/// Everything else (including spaces and dots) is preserved.  The mapping is
/// deterministic, which is what makes the presence check on re-runs reliable:
/// the same comment always lands on the same alias.
///
/// # Examples
/// ```
/// # use bwssh_core::alias::alias_for;
/// assert_eq!(alias_for("Build-Server"), "build-server");
/// assert_eq!(alias_for("deploy@10.0.0.5:22"), "deploy@10.0.0.5_22");
/// assert_eq!(alias_for(r"corp\gateway"), "corp_gateway");
/// ```
pub fn alias_for(comment: &str) -> String {
    let lower = comment.to_lowercase();
    let mut out = String::with_capacity(lower.len());
    for ch in lower.chars() {
        match ch {
            '/' | ':' | '\\' | '*' | '?' | '"' | '<' | '>' | '|' => out.push('_'),
            c => out.push(c),
        }
    }
    out
}
