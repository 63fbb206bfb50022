/// Effective synthesis prompt: the style's base prompt plus, when given, one
/// adjustment instruction. Earlier adjustments are never carried over.
pub fn build_synthesis_prompt(base_prompt: &str, adjustment: Option<&str>) -> String {
    match adjustment.filter(|s| !s.is_empty()) {
        Some(adj) => format!("{base_prompt}, {adj}"),
        None => base_prompt.to_string(),
    }
}
