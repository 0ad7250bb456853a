//! Rich-text to HTML rendering for page bodies.
use serde::Deserialize;
use std::fmt::Write;

pub trait RichTextRenderer: Send + Sync {
    /// Never fails. Input that cannot be rendered is returned unchanged.
    fn render(&self, markup: &str) -> String;
}

#[derive(thiserror::Error, Debug)]
enum RenderFailure {
    #[error("not a rich text document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("root node is {0:?}, expected document")]
    NotADocument(String),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Node {
    node_type: String,
    #[serde(default)]
    content: Vec<Node>,
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    marks: Vec<Mark>,
    #[serde(default)]
    data: NodeData,
}

#[derive(Deserialize)]
struct Mark {
    #[serde(rename = "type")]
    mark_type: String,
}

#[derive(Deserialize, Default)]
struct NodeData {
    uri: Option<String>,
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

fn mark_tag(mark: &str) -> Option<&'static str> {
    match mark {
        "bold" => Some("b"),
        "italic" => Some("i"),
        "underline" => Some("u"),
        "code" => Some("code"),
        _ => None,
    }
}

fn block_tag(node_type: &str) -> Option<&'static str> {
    let tag = match node_type {
        "paragraph" => "p",
        "heading-1" => "h1",
        "heading-2" => "h2",
        "heading-3" => "h3",
        "heading-4" => "h4",
        "heading-5" => "h5",
        "heading-6" => "h6",
        "unordered-list" => "ul",
        "ordered-list" => "ol",
        "list-item" => "li",
        "blockquote" => "blockquote",
        "table" => "table",
        "table-row" => "tr",
        "table-cell" => "td",
        "table-header-cell" => "th",
        _ => return None,
    };
    Some(tag)
}

/// Renders CMS rich-text documents (JSON node trees) to HTML.
#[derive(Clone, Copy, Debug, Default)]
pub struct HtmlRenderer;

impl HtmlRenderer {
    fn try_render(&self, markup: &str) -> Result<String, RenderFailure> {
        let root: Node = serde_json::from_str(markup)?;
        if root.node_type != "document" {
            return Err(RenderFailure::NotADocument(root.node_type));
        }

        let mut out = String::new();
        render_children(&root, &mut out);
        Ok(out)
    }
}

impl RichTextRenderer for HtmlRenderer {
    fn render(&self, markup: &str) -> String {
        match self.try_render(markup) {
            Ok(html) => html,
            Err(e) => {
                tracing::debug!(error = %e, "rich text not rendered, using raw content");
                markup.to_string()
            }
        }
    }
}

fn render_children(node: &Node, out: &mut String) {
    for child in &node.content {
        render_node(child, out);
    }
}

fn render_node(node: &Node, out: &mut String) {
    match node.node_type.as_str() {
        "text" => render_text(node, out),
        "hr" => out.push_str("<hr/>"),
        "hyperlink" => {
            let uri = node.data.uri.as_deref().unwrap_or_default();
            let _ = write!(out, "<a href=\"{}\">", html_escape(uri));
            render_children(node, out);
            out.push_str("</a>");
        }
        other => match block_tag(other) {
            Some(tag) => {
                let _ = write!(out, "<{tag}>");
                render_children(node, out);
                let _ = write!(out, "</{tag}>");
            }
            // Unknown and embedded nodes contribute their children only
            None => render_children(node, out),
        },
    }
}

fn render_text(node: &Node, out: &mut String) {
    let tags: Vec<&str> = node
        .marks
        .iter()
        .filter_map(|m| mark_tag(&m.mark_type))
        .collect();

    for tag in &tags {
        let _ = write!(out, "<{tag}>");
    }
    out.push_str(&html_escape(node.value.as_deref().unwrap_or_default()));
    for tag in tags.iter().rev() {
        let _ = write!(out, "</{tag}>");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn render(doc: serde_json::Value) -> String {
        HtmlRenderer.render(&doc.to_string())
    }

    fn text(value: &str, marks: &[&str]) -> serde_json::Value {
        let marks: Vec<_> = marks.iter().map(|m| json!({ "type": m })).collect();
        json!({ "nodeType": "text", "value": value, "marks": marks, "data": {} })
    }

    #[test]
    fn test_render_document() {
        let doc = json!({
            "nodeType": "document",
            "data": {},
            "content": [
                { "nodeType": "heading-2", "content": [text("Welcome", &[])] },
                { "nodeType": "paragraph", "content": [
                    text("Hello ", &[]),
                    text("world", &["bold", "italic"]),
                    { "nodeType": "hyperlink", "data": { "uri": "https://example.com/?a=1&b=2" },
                      "content": [text("link", &[])] },
                ]},
                { "nodeType": "hr", "content": [] },
                { "nodeType": "unordered-list", "content": [
                    { "nodeType": "list-item", "content": [
                        { "nodeType": "paragraph", "content": [text("one", &["code"])] }
                    ]}
                ]},
            ]
        });

        assert_eq!(
            render(doc),
            "<h2>Welcome</h2>\
             <p>Hello <b><i>world</i></b><a href=\"https://example.com/?a=1&amp;b=2\">link</a></p>\
             <hr/>\
             <ul><li><p><code>one</code></p></li></ul>"
        );
    }

    #[test]
    fn test_render_table_and_quote() {
        let doc = json!({
            "nodeType": "document",
            "content": [
                { "nodeType": "blockquote", "content": [
                    { "nodeType": "paragraph", "content": [text("quoted", &["underline"])] }
                ]},
                { "nodeType": "table", "content": [
                    { "nodeType": "table-row", "content": [
                        { "nodeType": "table-header-cell", "content": [text("Size", &[])] },
                        { "nodeType": "table-cell", "content": [text("XL", &[])] },
                    ]}
                ]},
            ]
        });

        assert_eq!(
            render(doc),
            "<blockquote><p><u>quoted</u></p></blockquote>\
             <table><tr><th>Size</th><td>XL</td></tr></table>"
        );
    }

    #[test]
    fn test_escapes_text_and_skips_unknown_nodes() {
        let doc = json!({
            "nodeType": "document",
            "content": [
                { "nodeType": "embedded-entry-block", "data": { "target": {} }, "content": [] },
                { "nodeType": "paragraph", "content": [text("<script>\"x\" & 'y'</script>", &["strikethrough"])] },
            ]
        });
        assert_eq!(
            render(doc),
            "<p>&lt;script&gt;&quot;x&quot; &amp; &#x27;y&#x27;&lt;/script&gt;</p>"
        );
    }

    #[test]
    fn test_falls_back_to_input() {
        for input in [
            "<p>Hi</p>",
            "",
            "plain text",
            r#"{"nodeType": "paragraph", "content": []}"#,
            r#"{"content": []}"#,
        ] {
            assert_eq!(HtmlRenderer.render(input), input);
        }
    }
}
