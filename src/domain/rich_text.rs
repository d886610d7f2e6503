//! Structured rich text as delivered by the CMS, and its HTML rendering.
//!
//! A field is an ordered list of block nodes. Each node carries plain text plus
//! a list of inline spans addressed by character offsets. Consecutive list
//! items are grouped into a single `<ul>`/`<ol>`. The produced markup is passed
//! through `ammonia` before it leaves this module.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockKind {
    #[serde(rename = "paragraph")]
    Paragraph,
    #[serde(rename = "heading1")]
    Heading1,
    #[serde(rename = "heading2")]
    Heading2,
    #[serde(rename = "heading3")]
    Heading3,
    #[serde(rename = "heading4")]
    Heading4,
    #[serde(rename = "heading5")]
    Heading5,
    #[serde(rename = "heading6")]
    Heading6,
    #[serde(rename = "preformatted")]
    Preformatted,
    #[serde(rename = "list-item")]
    ListItem,
    #[serde(rename = "o-list-item")]
    OrderedListItem,
    #[serde(rename = "image")]
    Image,
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpanKind {
    #[serde(rename = "strong")]
    Strong,
    #[serde(rename = "em")]
    Emphasis,
    #[serde(rename = "hyperlink")]
    Hyperlink,
    #[serde(rename = "label")]
    Label,
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanData {
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    #[serde(rename = "type")]
    pub kind: SpanKind,
    #[serde(default)]
    pub data: Option<SpanData>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RichTextNode {
    #[serde(rename = "type")]
    pub kind: BlockKind,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub spans: Vec<Span>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub alt: Option<String>,
}

impl RichTextNode {
    pub fn paragraph(text: impl Into<String>) -> Self {
        Self {
            kind: BlockKind::Paragraph,
            text: text.into(),
            spans: Vec::new(),
            url: None,
            alt: None,
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.spans.push(span);
        self
    }
}

/// Concatenated text of every node, one node per line.
pub fn as_text(nodes: &[RichTextNode]) -> String {
    nodes
        .iter()
        .map(|node| node.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render nodes to sanitized HTML.
pub fn as_html(nodes: &[RichTextNode]) -> String {
    let mut html = String::new();
    let mut open_list: Option<BlockKind> = None;

    for node in nodes {
        let list_kind = match node.kind {
            BlockKind::ListItem | BlockKind::OrderedListItem => Some(node.kind),
            _ => None,
        };

        if open_list != list_kind {
            if let Some(kind) = open_list.take() {
                html.push_str(list_close(kind));
            }
            if let Some(kind) = list_kind {
                html.push_str(list_open(kind));
                open_list = Some(kind);
            }
        }

        render_node(node, &mut html);
    }

    if let Some(kind) = open_list {
        html.push_str(list_close(kind));
    }

    ammonia::clean(&html)
}

fn list_open(kind: BlockKind) -> &'static str {
    if kind == BlockKind::OrderedListItem {
        "<ol>"
    } else {
        "<ul>"
    }
}

fn list_close(kind: BlockKind) -> &'static str {
    if kind == BlockKind::OrderedListItem {
        "</ol>"
    } else {
        "</ul>"
    }
}

fn render_node(node: &RichTextNode, html: &mut String) {
    let tag = match node.kind {
        BlockKind::Paragraph => "p",
        BlockKind::Heading1 => "h1",
        BlockKind::Heading2 => "h2",
        BlockKind::Heading3 => "h3",
        BlockKind::Heading4 => "h4",
        BlockKind::Heading5 => "h5",
        BlockKind::Heading6 => "h6",
        BlockKind::Preformatted => "pre",
        BlockKind::ListItem | BlockKind::OrderedListItem => "li",
        BlockKind::Image => {
            if let Some(url) = node.url.as_deref() {
                html.push_str("<p><img src=\"");
                html.push_str(&escape_html(url));
                html.push_str("\" alt=\"");
                html.push_str(&escape_html(node.alt.as_deref().unwrap_or_default()));
                html.push_str("\" /></p>");
            }
            return;
        }
        BlockKind::Unsupported => return,
    };

    html.push('<');
    html.push_str(tag);
    html.push('>');
    html.push_str(&render_spans(&node.text, &node.spans));
    html.push_str("</");
    html.push_str(tag);
    html.push('>');
}

/// Interleave span tags with escaped text. Spans that cross each other are
/// closed and reopened so the output stays well nested.
fn render_spans(text: &str, spans: &[Span]) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut ordered: Vec<&Span> = spans
        .iter()
        .filter(|span| span.start < span.end && span.kind != SpanKind::Unsupported)
        .collect();
    ordered.sort_by(|left, right| {
        left.start
            .cmp(&right.start)
            .then(right.end.cmp(&left.end))
    });

    let mut out = String::with_capacity(text.len());
    let mut open: Vec<&Span> = Vec::new();
    let mut pending = ordered.into_iter().peekable();

    for index in 0..=chars.len() {
        if open.iter().any(|span| span.end <= index) {
            let mut reopen = Vec::new();
            while let Some(span) = open.pop() {
                out.push_str(close_tag(span));
                if span.end > index {
                    reopen.push(span);
                }
                if !open.iter().any(|span| span.end <= index) {
                    break;
                }
            }
            for span in reopen.into_iter().rev() {
                out.push_str(&open_tag(span));
                open.push(span);
            }
        }

        while let Some(span) = pending.next_if(|span| span.start <= index) {
            if span.end > index {
                out.push_str(&open_tag(span));
                open.push(span);
            }
        }

        match chars.get(index) {
            Some('\n') => out.push_str("<br />"),
            Some(ch) => push_escaped(&mut out, *ch),
            None => {}
        }
    }

    while let Some(span) = open.pop() {
        out.push_str(close_tag(span));
    }

    out
}

fn open_tag(span: &Span) -> String {
    match span.kind {
        SpanKind::Strong => "<strong>".to_string(),
        SpanKind::Emphasis => "<em>".to_string(),
        SpanKind::Hyperlink => {
            let url = span
                .data
                .as_ref()
                .and_then(|data| data.url.as_deref())
                .unwrap_or("#");
            format!("<a href=\"{}\">", escape_html(url))
        }
        SpanKind::Label | SpanKind::Unsupported => "<span>".to_string(),
    }
}

fn close_tag(span: &Span) -> &'static str {
    match span.kind {
        SpanKind::Strong => "</strong>",
        SpanKind::Emphasis => "</em>",
        SpanKind::Hyperlink => "</a>",
        SpanKind::Label | SpanKind::Unsupported => "</span>",
    }
}

fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        push_escaped(&mut out, ch);
    }
    out
}

fn push_escaped(out: &mut String, ch: char) {
    match ch {
        '&' => out.push_str("&amp;"),
        '<' => out.push_str("&lt;"),
        '>' => out.push_str("&gt;"),
        '"' => out.push_str("&quot;"),
        '\'' => out.push_str("&#39;"),
        other => out.push(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(start: usize, end: usize, kind: SpanKind) -> Span {
        Span {
            start,
            end,
            kind,
            data: None,
        }
    }

    fn node(kind: BlockKind, text: &str) -> RichTextNode {
        RichTextNode {
            kind,
            text: text.to_string(),
            spans: Vec::new(),
            url: None,
            alt: None,
        }
    }

    #[test]
    fn paragraphs_render_in_order() {
        let html = as_html(&[
            RichTextNode::paragraph("first"),
            RichTextNode::paragraph("second"),
        ]);
        assert_eq!(html, "<p>first</p><p>second</p>");
    }

    #[test]
    fn text_is_escaped() {
        let html = as_html(&[RichTextNode::paragraph("<script>alert(1)</script> & co")]);
        assert!(!html.contains("<script>"));
        assert!(html.contains("&amp; co"));
    }

    #[test]
    fn spans_wrap_character_ranges() {
        let paragraph = RichTextNode::paragraph("hello bold world")
            .with_span(span(6, 10, SpanKind::Strong));
        assert_eq!(
            as_html(&[paragraph]),
            "<p>hello <strong>bold</strong> world</p>"
        );
    }

    #[test]
    fn crossing_spans_stay_well_nested() {
        let paragraph = RichTextNode::paragraph("abcdef")
            .with_span(span(0, 4, SpanKind::Strong))
            .with_span(span(2, 6, SpanKind::Emphasis));
        assert_eq!(
            as_html(&[paragraph]),
            "<p><strong>ab<em>cd</em></strong><em>ef</em></p>"
        );
    }

    #[test]
    fn spans_use_character_offsets() {
        let paragraph =
            RichTextNode::paragraph("ação rápida").with_span(span(5, 11, SpanKind::Emphasis));
        assert_eq!(as_html(&[paragraph]), "<p>ação <em>rápida</em></p>");
    }

    #[test]
    fn hyperlinks_keep_their_target() {
        let paragraph = RichTextNode::paragraph("see docs").with_span(Span {
            start: 4,
            end: 8,
            kind: SpanKind::Hyperlink,
            data: Some(SpanData {
                url: Some("https://example.com/docs".to_string()),
            }),
        });
        let html = as_html(&[paragraph]);
        assert!(html.contains("href=\"https://example.com/docs\""));
        assert!(html.contains(">docs</a>"));
    }

    #[test]
    fn javascript_links_are_stripped() {
        let paragraph = RichTextNode::paragraph("click").with_span(Span {
            start: 0,
            end: 5,
            kind: SpanKind::Hyperlink,
            data: Some(SpanData {
                url: Some("javascript:alert(1)".to_string()),
            }),
        });
        assert!(!as_html(&[paragraph]).contains("javascript:"));
    }

    #[test]
    fn consecutive_list_items_share_a_list() {
        let html = as_html(&[
            node(BlockKind::ListItem, "one"),
            node(BlockKind::ListItem, "two"),
            node(BlockKind::OrderedListItem, "first"),
            RichTextNode::paragraph("after"),
        ]);
        assert_eq!(
            html,
            "<ul><li>one</li><li>two</li></ul><ol><li>first</li></ol><p>after</p>"
        );
    }

    #[test]
    fn headings_and_preformatted_map_to_tags() {
        let html = as_html(&[
            node(BlockKind::Heading2, "Title"),
            node(BlockKind::Preformatted, "let x = 1;"),
        ]);
        assert_eq!(html, "<h2>Title</h2><pre>let x = 1;</pre>");
    }

    #[test]
    fn unsupported_blocks_are_skipped() {
        let html = as_html(&[
            node(BlockKind::Unsupported, "embed"),
            RichTextNode::paragraph("kept"),
        ]);
        assert_eq!(html, "<p>kept</p>");
    }

    #[test]
    fn node_kinds_deserialize_from_wire_names() {
        let raw = r#"[
            {"type": "heading1", "text": "a", "spans": []},
            {"type": "o-list-item", "text": "b", "spans": [{"start": 0, "end": 1, "type": "em"}]},
            {"type": "embed", "oembed": {}}
        ]"#;
        let nodes: Vec<RichTextNode> = serde_json::from_str(raw).expect("valid rich text");
        assert_eq!(nodes[0].kind, BlockKind::Heading1);
        assert_eq!(nodes[1].kind, BlockKind::OrderedListItem);
        assert_eq!(nodes[1].spans[0].kind, SpanKind::Emphasis);
        assert_eq!(nodes[2].kind, BlockKind::Unsupported);
    }

    #[test]
    fn as_text_joins_nodes_by_line() {
        let text = as_text(&[
            RichTextNode::paragraph("one"),
            RichTextNode::paragraph("two"),
        ]);
        assert_eq!(text, "one\ntwo");
    }
}
