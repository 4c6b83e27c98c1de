use quick_xml::events::Event;
use quick_xml::Reader;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed XML: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("not an RSS document: {0}")]
    NotRss(String),
    #[error("document ended inside <{0}>")]
    Truncated(String),
}

/// A parsed RSS document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedFeed {
    pub title: String,
    pub link: String,
    pub description: String,
    /// Items in document order
    pub items: Vec<ParsedFeedItem>,
}

/// One `<item>` as it appeared in the feed.
///
/// Fields hold the decoded element text. Nothing is defaulted or date-parsed
/// here; a missing element is indistinguishable from an empty one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedFeedItem {
    pub title: String,
    pub link: String,
    pub description: String,
    pub pub_date: String,
}

impl ParsedFeedItem {
    fn field_mut(&mut self, name: &[u8]) -> Option<&mut String> {
        match name {
            b"title" => Some(&mut self.title),
            b"link" => Some(&mut self.link),
            b"description" => Some(&mut self.description),
            b"pubDate" => Some(&mut self.pub_date),
            _ => None,
        }
    }
}

impl ParsedFeed {
    fn field_mut(&mut self, name: &[u8]) -> Option<&mut String> {
        match name {
            b"title" => Some(&mut self.title),
            b"link" => Some(&mut self.link),
            b"description" => Some(&mut self.description),
            _ => None,
        }
    }

    /// Where text at the current element path belongs, if anywhere.
    ///
    /// Names are compared including any namespace prefix, so `itunes:title`
    /// or `atom:link` never land in `title`/`link`.
    fn target<'a>(
        &'a mut self,
        item: &'a mut Option<ParsedFeedItem>,
        path: &[Vec<u8>],
    ) -> Option<&'a mut String> {
        match path {
            [_rss, channel, field] if channel.as_slice() == b"channel" => self.field_mut(field),
            [_rss, channel, it, field]
                if channel.as_slice() == b"channel" && it.as_slice() == b"item" =>
            {
                item.as_mut()?.field_mut(field)
            }
            _ => None,
        }
    }
}

/// Parse an RSS 2.0 `<rss><channel>...</channel></rss>` document.
///
/// Entities and CDATA sections are decoded. Character data is kept as
/// written and only trimmed at the ends once the element closes; text inside
/// nested child elements is dropped. Elements the engine does not use are
/// skipped.
pub fn parse_feed(bytes: &[u8]) -> Result<ParsedFeed, ParseError> {
    let mut reader = Reader::from_reader(bytes);

    let mut feed = ParsedFeed::default();
    let mut item: Option<ParsedFeedItem> = None;
    let mut saw_channel = false;
    let mut path: Vec<Vec<u8>> = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                let name = e.name().as_ref().to_vec();
                match path.len() {
                    0 if name != b"rss" => {
                        return Err(ParseError::NotRss(format!(
                            "root element is <{}>",
                            String::from_utf8_lossy(&name)
                        )));
                    }
                    1 if name == b"channel" => saw_channel = true,
                    2 if name == b"item" && path[1] == b"channel" => {
                        item = Some(ParsedFeedItem::default());
                    }
                    _ => {}
                }
                path.push(name);
            }
            Event::End(_) => {
                if let Some(field) = feed.target(&mut item, &path) {
                    *field = field.trim().to_string();
                }
                if path.len() == 3 && path[2] == b"item" {
                    if let Some(done) = item.take() {
                        feed.items.push(done);
                    }
                }
                path.pop();
            }
            Event::Empty(e) if path.is_empty() && e.name().as_ref() != b"rss" => {
                return Err(ParseError::NotRss("empty document element".to_string()));
            }
            Event::Text(t) => {
                if let Some(field) = feed.target(&mut item, &path) {
                    let text = t
                        .unescape()
                        .map(|s| s.into_owned())
                        .unwrap_or_else(|_| String::from_utf8_lossy(&t).into_owned());
                    field.push_str(&text);
                }
            }
            Event::CData(c) => {
                if let Some(field) = feed.target(&mut item, &path) {
                    field.push_str(&String::from_utf8_lossy(&c));
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if let Some(open) = path.last() {
        return Err(ParseError::Truncated(String::from_utf8_lossy(open).into_owned()));
    }
    if !saw_channel {
        return Err(ParseError::NotRss("missing <channel>".to_string()));
    }

    Ok(feed)
}
