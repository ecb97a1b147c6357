/// Look up the known context window size (in tokens) for a Gemini model.
///
/// Uses prefix matching on the lowercased model name so that dated or
/// `-latest` variants resolve to their family.
///
/// Returns `None` for unknown models.
pub fn known_context_window(model: &str) -> Option<u32> {
    let model = model.to_lowercase();
    let model = model.strip_prefix("models/").unwrap_or(&model);

    if model.starts_with("gemini-2.5-") || model.starts_with("gemini-2.0-") {
        return Some(1_000_000);
    }
    if model.starts_with("gemini-1.5-pro") {
        return Some(2_000_000);
    }
    if model.starts_with("gemini-1.5-flash") {
        return Some(1_000_000);
    }

    None
}
