//! Wire shapes of the CMS REST API and their mapping onto domain posts.

use serde::Deserialize;
use time::{
    OffsetDateTime, format_description::FormatItem, format_description::well_known::Rfc3339,
    macros::format_description,
};

use crate::domain::posts::{ContentBlock, PostDetail, PostSummary};
use crate::domain::rich_text::{self, RichTextNode};

/// `2021-03-15T19:25:28+0000`, the offset written without a colon.
const COMPACT_OFFSET_FORMAT: &[FormatItem<'static>] = format_description!(
    "[year]-[month]-[day]T[hour]:[minute]:[second][offset_hour sign:mandatory][offset_minute]"
);

#[derive(Debug, Deserialize)]
pub struct ApiRoot {
    #[serde(default)]
    pub refs: Vec<ApiRef>,
}

#[derive(Debug, Deserialize)]
pub struct ApiRef {
    #[serde(rename = "ref")]
    pub reference: String,
    #[serde(rename = "isMasterRef", default)]
    pub is_master_ref: bool,
}

impl ApiRoot {
    pub fn master_ref(&self) -> Option<&str> {
        self.refs
            .iter()
            .find(|candidate| candidate.is_master_ref)
            .map(|candidate| candidate.reference.as_str())
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub results: Vec<RawDocument>,
    #[serde(default)]
    pub next_page: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RawDocument {
    #[serde(default)]
    pub uid: Option<String>,
    #[serde(default)]
    pub first_publication_date: Option<String>,
    #[serde(default)]
    pub data: RawPostData,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawPostData {
    pub title: Option<TextField>,
    pub subtitle: Option<TextField>,
    pub author: Option<TextField>,
    pub banner: Option<RawImage>,
    pub content: Vec<RawContentGroup>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawImage {
    pub url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawContentGroup {
    pub heading: Option<TextField>,
    pub body: Vec<RichTextNode>,
}

/// Key-text fields arrive as strings, title fields as rich text.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum TextField {
    Plain(String),
    Rich(Vec<RichTextNode>),
}

fn text_of(field: Option<TextField>) -> String {
    match field {
        Some(TextField::Plain(text)) => text,
        Some(TextField::Rich(nodes)) => rich_text::as_text(&nodes),
        None => String::new(),
    }
}

pub fn parse_publication_date(raw: &str) -> Option<OffsetDateTime> {
    OffsetDateTime::parse(raw, &Rfc3339)
        .or_else(|_| OffsetDateTime::parse(raw, COMPACT_OFFSET_FORMAT))
        .ok()
}

impl RawDocument {
    /// `None` for documents without a uid; they cannot be routed to.
    pub fn into_summary(self) -> Option<PostSummary> {
        let uid = self.uid.filter(|uid| !uid.is_empty())?;
        Some(PostSummary {
            uid,
            first_publication_date: self
                .first_publication_date
                .as_deref()
                .and_then(parse_publication_date),
            title: text_of(self.data.title),
            subtitle: text_of(self.data.subtitle),
            author: text_of(self.data.author),
        })
    }

    pub fn into_detail(self) -> Option<PostDetail> {
        let uid = self.uid.filter(|uid| !uid.is_empty())?;
        let RawPostData {
            title,
            subtitle,
            author,
            banner,
            content,
        } = self.data;

        Some(PostDetail {
            uid,
            first_publication_date: self
                .first_publication_date
                .as_deref()
                .and_then(parse_publication_date),
            title: text_of(title),
            subtitle: text_of(subtitle),
            author: text_of(author),
            banner_url: banner
                .and_then(|image| image.url)
                .filter(|url| !url.is_empty()),
            content: content
                .into_iter()
                .map(|group| ContentBlock::new(text_of(group.heading), group.body))
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::domain::posts::display_date;
    use crate::domain::rich_text::BlockKind;

    const SEARCH_JSON: &str = r#"{
        "page": 1,
        "results_per_page": 1,
        "next_page": "https://spacetraveling.cdn.prismic.io/api/v2/documents/search?ref=YFUx&page=2&pageSize=1",
        "results": [
            {
                "id": "YFUxSRIAACEAoF3a",
                "uid": "como-utilizar-hooks",
                "type": "posts",
                "first_publication_date": "2021-03-15T19:25:28+0000",
                "data": {
                    "title": "Como utilizar Hooks",
                    "subtitle": "Pensando em sincronização em vez de ciclos de vida",
                    "author": "Joseph Oliveira",
                    "banner": {"url": "https://images.prismic.io/banner.png", "alt": null},
                    "content": [
                        {
                            "heading": "Proin et varius",
                            "body": [
                                {"type": "paragraph", "text": "Lorem ipsum dolor", "spans": [
                                    {"start": 0, "end": 5, "type": "strong"}
                                ]},
                                {"type": "list-item", "text": "um", "spans": []}
                            ]
                        }
                    ]
                }
            },
            {"uid": null, "data": {}}
        ]
    }"#;

    #[test]
    fn parses_compact_offset_dates() {
        let parsed = parse_publication_date("2021-03-15T19:25:28+0000").expect("date");
        assert_eq!(parsed, datetime!(2021-03-15 19:25:28 UTC));
        assert_eq!(display_date(Some(parsed)), "15 Mar 2021");
    }

    #[test]
    fn parses_rfc3339_dates() {
        let parsed = parse_publication_date("2021-03-25T12:00:00-03:00").expect("date");
        assert_eq!(display_date(Some(parsed)), "25 Mar 2021");
        assert!(parse_publication_date("yesterday").is_none());
    }

    #[test]
    fn search_response_maps_to_summaries() {
        let response: SearchResponse = serde_json::from_str(SEARCH_JSON).expect("json");
        assert!(response.next_page.is_some());

        let summaries: Vec<_> = response
            .results
            .into_iter()
            .filter_map(RawDocument::into_summary)
            .collect();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].uid, "como-utilizar-hooks");
        assert_eq!(summaries[0].author, "Joseph Oliveira");
    }

    #[test]
    fn document_maps_to_detail() {
        let response: SearchResponse = serde_json::from_str(SEARCH_JSON).expect("json");
        let detail = response
            .results
            .into_iter()
            .next()
            .and_then(RawDocument::into_detail)
            .expect("detail");

        assert_eq!(
            detail.banner_url.as_deref(),
            Some("https://images.prismic.io/banner.png")
        );
        assert_eq!(detail.content.len(), 1);
        assert_eq!(detail.content[0].heading, "Proin et varius");
        assert_eq!(detail.content[0].body[1].kind, BlockKind::ListItem);
        assert_eq!(detail.content[0].body[0].spans.len(), 1);
    }

    #[test]
    fn rich_text_titles_are_flattened() {
        let doc: RawDocument = serde_json::from_str(
            r#"{"uid": "a", "data": {"title": [{"type": "heading1", "text": "Olá", "spans": []}]}}"#,
        )
        .expect("json");
        let summary = doc.into_summary().expect("summary");
        assert_eq!(summary.title, "Olá");
        assert!(summary.first_publication_date.is_none());
        assert_eq!(summary.subtitle, "");
    }

    #[test]
    fn master_ref_is_selected() {
        let root: ApiRoot = serde_json::from_str(
            r#"{"refs": [
                {"id": "preview", "ref": "PREVIEW", "isMasterRef": false},
                {"id": "master", "ref": "YFUx", "isMasterRef": true}
            ]}"#,
        )
        .expect("json");
        assert_eq!(root.master_ref(), Some("YFUx"));
    }
}
