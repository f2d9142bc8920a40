//! Naming helpers shared by the pipeline and the orchestrator.

/// Derives the result label for a partition id.
///
/// The last `_`-delimited token of the id (ignoring a trailing `/`) is used when it is
/// a run of digits, which for archive ids is the acquisition year. Anything else falls
/// back to the full id.
///
/// # Examples
///
/// ```
/// use lidargeo_core::utils::region_label;
///
/// assert_eq!(region_label("USGS_LPC_IA_FullState_2009/"), "2009");
/// assert_eq!(region_label("IA_FullState/"), "IA_FullState/");
/// ```
#[must_use]
pub fn region_label(region: &str) -> String {
    let trimmed = region.trim_end_matches('/');
    match trimmed.rsplit('_').next() {
        Some(token) if !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit()) => {
            token.to_string()
        },
        _ => region.to_string(),
    }
}

/// File stem for a partition's artifacts: the id without surrounding slashes.
#[must_use]
pub fn region_stem(region: &str) -> &str {
    region.trim_matches('/')
}
