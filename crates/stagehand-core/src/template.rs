//! `{{key}}` template substitution for step bodies.

use std::collections::HashMap;

/// Replaces every occurrence of `{{key}}` in `content` with the value from
/// `vars`. Missing keys leave their placeholders intact. No escaping.
pub fn render(content: &str, vars: &HashMap<String, String>) -> String {
    if content.is_empty() || vars.is_empty() {
        return content.to_string();
    }

    let mut rendered = content.to_string();
    for (key, value) in vars {
        let placeholder = format!("{{{{{key}}}}}");
        rendered = rendered.replace(&placeholder, value);
    }
    rendered
}
