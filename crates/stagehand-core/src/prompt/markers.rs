//! Layer markers identifying protected system content.

/// XML tag identifying Layer 1 content in system messages.
pub const LAYER_MARKER: &str = "<system_core_prompt>";

/// Whether a system message contains Layer 1+2 content that must never be
/// compressed.
pub fn is_protected_system_message(content: &str) -> bool {
    content.contains("<system_core_prompt>") || content.contains("<pkg_inject_prompt>")
}
