//! Plain-text rendering of the screen view model.

use readsync_core::{Banner, NodeRowView, ScreenViewModel, SearchView};
use serde_json::Value;

pub fn render(view: &ScreenViewModel) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(item) = &view.item {
        lines.push(format!("Discussion for {item} ({} entries)", view.node_count));
        lines.extend(view.nodes.iter().map(render_row));
        if view.saving {
            lines.push("  (saving...)".to_string());
        }
    }
    if let Some(search) = &view.search {
        lines.extend(render_search(search));
    }
    lines
}

fn render_row(row: &NodeRowView) -> String {
    let indent = "  ".repeat(row.depth + 1);
    let mut flags = String::new();
    if row.edited {
        flags.push_str(" (edited)");
    }
    if row.provisional {
        flags.push_str(" (pending)");
    }
    format!("{indent}[{}] {}: {}{flags}", row.id, row.author, row.text)
}

fn render_search(search: &SearchView) -> Vec<String> {
    let mut lines = vec![format!("Search \"{}\": {}", search.query, search.label)];
    lines.extend(search.results.iter().map(|book| format!("  {}", book_line(book))));
    let range = &search.selectable_pages;
    let pages = match (range.is_empty(), range.start() == range.end()) {
        (true, _) => "none".to_string(),
        (false, true) => range.start().to_string(),
        (false, false) => format!("{}-{}", range.start(), range.end()),
    };
    let more = if search.certain || !search.can_go_next {
        ""
    } else {
        " ..."
    };
    lines.push(format!("  pages: {pages}{more}"));
    lines
}

fn book_line(book: &Value) -> String {
    let field = |key: &str| book.get(key).and_then(Value::as_str).unwrap_or_default();
    match (field("title"), field("author")) {
        ("", _) => book.to_string(),
        (title, "") => title.to_string(),
        (title, author) => format!("{title} by {author}"),
    }
}

pub fn render_banner(banner: &Banner) -> String {
    match banner {
        Banner::Points {
            message, points, ..
        } if message.is_empty() => format!("* +{points} points"),
        Banner::Points { message, .. } => format!("* {message}"),
        Banner::Achievement(achievement) => {
            format!("* Achievement unlocked: {}", achievement.name)
        }
        Banner::Error { message } => format!("! {message}"),
    }
}
