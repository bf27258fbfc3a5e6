//! Standalone HTML rendering of a [`Page`].
//!
//! Figures are embedded as JSON and drawn by plotly.js loaded from its CDN.

use crate::dashboard::{Page, Panel};
use std::fmt::Write;

const PLOTLY_CDN: &str = "https://cdn.plot.ly/plotly-2.35.2.min.js";

const STYLE: &str = r#"
    body { font-family: sans-serif; margin: 1.5rem; }
    .row { display: flex; gap: 1rem; }
    .column { flex: 1; min-width: 0; }
    .warning { background: #fff3cd; border: 1px solid #ffe69c; padding: 0.75rem; margin: 0.5rem 0; }
    .error { background: #f8d7da; border: 1px solid #f1aeb5; padding: 0.75rem; margin: 0.5rem 0; }
    .note { background: #cfe2ff; border: 1px solid #9ec5fe; padding: 0.75rem; margin: 0.5rem 0; }
    hr { margin: 1.5rem 0; }
"#;

/// Escapes text for use in HTML element content and attribute values.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// JSON safe to place inside a `<script>` element.
fn script_json(json: &str) -> String {
    json.replace("</", "<\\/")
}

pub fn render_html(page: &Page) -> serde_json::Result<String> {
    let mut body = String::new();
    let mut scripts = String::new();
    let mut figure_count = 0;

    // Writing to a String cannot fail.
    let _ = writeln!(body, "<h1>{}</h1>", escape_html(&page.title));
    if let Some(sub) = &page.subheading {
        let _ = writeln!(body, "<h3>{}</h3>", escape_html(sub));
    }
    for error in &page.errors {
        let _ = writeln!(body, "<div class=\"error\">{}</div>", escape_html(error));
    }

    for (i, section) in page.sections.iter().enumerate() {
        if i > 0 {
            body.push_str("<hr>\n");
        }
        if let Some(heading) = &section.heading {
            let _ = writeln!(body, "<h3>{}</h3>", escape_html(heading));
        }
        body.push_str("<div class=\"row\">\n");
        for column in &section.columns {
            body.push_str("<div class=\"column\">\n");
            for panel in column {
                match panel {
                    Panel::Map { figure } => {
                        let id = format!("figure-{}", figure_count);
                        figure_count += 1;
                        let _ = writeln!(body, "<div id=\"{}\"></div>", id);
                        let data = script_json(&serde_json::to_string(&figure.data)?);
                        let layout = script_json(&serde_json::to_string(&figure.layout)?);
                        let _ = writeln!(
                            scripts,
                            "Plotly.newPlot(\"{}\", {}, {}, {{\"responsive\": true}});",
                            id, data, layout
                        );
                    }
                    Panel::Warning { message } => {
                        let _ = writeln!(
                            body,
                            "<div class=\"warning\">{}</div>",
                            escape_html(message)
                        );
                    }
                    Panel::Text { text } => {
                        let _ = writeln!(body, "<p>{}</p>", escape_html(text));
                    }
                }
            }
            body.push_str("</div>\n");
        }
        body.push_str("</div>\n");
    }

    for note in &page.notes {
        let _ = writeln!(body, "<div class=\"note\">{}</div>", escape_html(note));
    }

    Ok(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title}</title>
<script src="{cdn}"></script>
<style>{style}</style>
</head>
<body>
{body}<script>
{scripts}</script>
</body>
</html>
"#,
        title = escape_html(&page.title),
        cdn = PLOTLY_CDN,
        style = STYLE,
        body = body,
        scripts = scripts,
    ))
}
