//! Markdown rendering of accepted resources

use crate::session::AcceptedItem;

/// One markdown list item: linked title (when a url is known), then rationale
pub fn resource_markdown(item: &AcceptedItem) -> String {
    let title = escape_brackets(item.title());
    let heading = match item.url() {
        Some(url) => format!("[{}]({})", title, url),
        None => format!("**{}**", title),
    };

    let rationale = item.rationale.trim();
    if rationale.is_empty() {
        format!("- {}", heading)
    } else {
        format!("- {}: {}", heading, rationale)
    }
}

fn escape_brackets(text: &str) -> String {
    text.replace('[', "\\[").replace(']', "\\]")
}
