use html_escape::{decode_html_entities, encode_text};
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Malformed RSS document: {0}")]
    Rss(#[from] quick_xml::de::DeError),

    #[error("Malformed feed document: {0}")]
    Feed(#[from] feed_rs::parser::ParseFeedError),
}

/// A decoded feed: channel metadata plus every item in document order.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedDocument {
    pub title: String,
    pub link: String,
    pub description: String,
    pub items: Vec<FeedItem>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeedItem {
    pub title: String,
    pub link: String,
    pub description: String,
    /// Raw publication date as found in the document.
    pub published: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RssDocument {
    channel: RssChannel,
}

/// Repeated element names (`link` next to `atom:link`, `title` next to
/// `itunes:title`) share a local name, so every text field collects all
/// occurrences and keeps the first non-empty one.
#[derive(Debug, Deserialize)]
struct RssChannel {
    #[serde(default)]
    title: Vec<TextNode>,
    #[serde(default)]
    link: Vec<TextNode>,
    #[serde(default)]
    description: Vec<TextNode>,
    #[serde(default, rename = "item")]
    items: Vec<RssItem>,
}

#[derive(Debug, Deserialize)]
struct RssItem {
    #[serde(default)]
    title: Vec<TextNode>,
    #[serde(default)]
    link: Vec<TextNode>,
    #[serde(default)]
    description: Vec<TextNode>,
    #[serde(default, rename = "pubDate")]
    pub_date: Vec<TextNode>,
}

#[derive(Debug, Default, Deserialize)]
struct TextNode {
    #[serde(default, rename = "$text")]
    text: String,
}

fn first_text(nodes: Vec<TextNode>) -> String {
    nodes
        .into_iter()
        .map(|n| n.text)
        .find(|t| !t.trim().is_empty())
        .unwrap_or_default()
}

#[derive(Clone, Default)]
pub struct FeedParser;

impl FeedParser {
    pub fn new() -> Self {
        Self
    }

    /// Decode `body` into a [`FeedDocument`].
    ///
    /// Channel title and description come back with HTML entities decoded;
    /// item title and description come back HTML-escaped.
    pub fn parse(&self, body: &[u8]) -> Result<FeedDocument, ParseError> {
        let raw = if root_element(body).as_deref() == Some(b"rss".as_slice()) {
            parse_rss(body)?
        } else {
            parse_other(body)?
        };
        Ok(present(raw))
    }
}

/// Local name of the first element in the document, if it is XML at all.
fn root_element(body: &[u8]) -> Option<Vec<u8>> {
    let mut reader = Reader::from_reader(body);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                return Some(e.local_name().as_ref().to_vec());
            }
            Ok(Event::Eof) | Err(_) => return None,
            Ok(_) => {}
        }
        buf.clear();
    }
}

fn parse_rss(body: &[u8]) -> Result<FeedDocument, ParseError> {
    let doc: RssDocument = quick_xml::de::from_reader(body)?;
    let channel = doc.channel;

    Ok(FeedDocument {
        title: first_text(channel.title),
        link: first_text(channel.link),
        description: first_text(channel.description),
        items: channel
            .items
            .into_iter()
            .map(|item| FeedItem {
                title: first_text(item.title),
                link: first_text(item.link).trim().to_string(),
                description: first_text(item.description),
                published: Some(first_text(item.pub_date)).filter(|d| !d.is_empty()),
            })
            .collect(),
    })
}

/// Atom, RSS 1.0 and JSON Feed go through feed-rs.
fn parse_other(body: &[u8]) -> Result<FeedDocument, ParseError> {
    let feed = feed_rs::parser::parse(body)?;

    Ok(FeedDocument {
        title: feed.title.map(|t| t.content).unwrap_or_default(),
        link: feed
            .links
            .first()
            .map(|l| l.href.clone())
            .unwrap_or_default(),
        description: feed.description.map(|d| d.content).unwrap_or_default(),
        items: feed
            .entries
            .into_iter()
            .map(|entry| FeedItem {
                title: entry.title.map(|t| t.content).unwrap_or_default(),
                link: entry
                    .links
                    .first()
                    .map(|l| l.href.trim().to_string())
                    .unwrap_or_default(),
                description: entry
                    .summary
                    .map(|s| s.content)
                    .or_else(|| entry.content.and_then(|c| c.body))
                    .unwrap_or_default(),
                published: entry
                    .published
                    .or(entry.updated)
                    .map(|dt| dt.to_rfc3339()),
            })
            .collect(),
    })
}

fn present(mut doc: FeedDocument) -> FeedDocument {
    doc.title = decode_html_entities(&doc.title).into_owned();
    doc.description = decode_html_entities(&doc.description).into_owned();
    for item in &mut doc.items {
        item.title = escape_html(&item.title);
        item.description = escape_html(&item.description);
    }
    doc
}

/// Escapes `<`, `>`, `&`, `'` and `"`, quotes as numeric references.
fn escape_html(s: &str) -> String {
    encode_text(s).replace('\'', "&#39;").replace('"', "&#34;")
}
