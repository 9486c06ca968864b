//! services/api/src/adapters/page_fetch.rs
//!
//! This module contains the HTTP metadata fetcher. It implements the
//! `MetadataFetcher` port: one GET with a bounded timeout, then title,
//! description and a visible-text character count scraped from the HTML.

use async_trait::async_trait;
use lorelog_core::domain::PageMetadata;
use lorelog_core::ports::{MetadataFetcher, PortError, PortResult};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use std::time::Duration;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
(KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

pub const MAX_TITLE_CHARS: usize = 200;

/// Elements whose text never counts towards the body length.
const IGNORED_ELEMENTS: &[&str] = &[
    "script", "style", "nav", "header", "footer", "aside", "form", "noscript",
];

static META: LazyLock<Selector> = LazyLock::new(|| Selector::parse("meta").expect("valid selector"));
static TITLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("title").expect("valid selector"));
/// Candidate containers for the main text, most specific first.
static BODY_CANDIDATES: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    ["article", "main", "section", "body"]
        .iter()
        .map(|s| Selector::parse(s).expect("valid selector"))
        .collect()
});

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `MetadataFetcher` with `reqwest`.
#[derive(Clone)]
pub struct HttpMetadataFetcher {
    client: reqwest::Client,
}

impl HttpMetadataFetcher {
    /// Creates a new `HttpMetadataFetcher` whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9,ja;q=0.8"));

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()?;
        Ok(Self { client })
    }
}

//=========================================================================================
// `MetadataFetcher` Trait Implementation
//=========================================================================================

#[async_trait]
impl MetadataFetcher for HttpMetadataFetcher {
    async fn fetch(&self, url: &str) -> PortResult<PageMetadata> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                PortError::Unexpected(format!("timed out fetching {}", url))
            } else {
                PortError::Unexpected(format!("failed to fetch {}: {}", url, e))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(PortError::Unexpected(format!("HTTP {} from {}", status, url)));
        }

        let html = response
            .text()
            .await
            .map_err(|e| PortError::Unexpected(format!("failed to read body of {}: {}", url, e)))?;
        Ok(parse_page(&html))
    }
}

//=========================================================================================
// HTML Parsing
//=========================================================================================

/// Extracts metadata from a page. Never fails; missing pieces are `None`/0.
pub fn parse_page(html: &str) -> PageMetadata {
    let document = Html::parse_document(html);

    let mut og_title = None;
    let mut og_description = None;
    let mut description = None;
    for meta in document.select(&META) {
        let key = meta
            .attr("property")
            .or_else(|| meta.attr("name"))
            .unwrap_or_default()
            .to_ascii_lowercase();
        let Some(content) = meta.attr("content").map(str::trim).filter(|c| !c.is_empty()) else {
            continue;
        };
        match key.as_str() {
            "og:title" if og_title.is_none() => og_title = Some(content.to_string()),
            "og:description" if og_description.is_none() => og_description = Some(content.to_string()),
            "description" if description.is_none() => description = Some(content.to_string()),
            _ => {}
        }
    }

    let title = og_title.or_else(|| {
        document
            .select(&TITLE)
            .next()
            .map(|t| collapse_whitespace(&t.text().collect::<String>()))
            .filter(|t| !t.is_empty())
            .map(|t| truncate_title(&t))
    });

    let body_length = BODY_CANDIDATES
        .iter()
        .find_map(|selector| document.select(selector).next())
        .map(visible_chars)
        .unwrap_or(0);

    PageMetadata {
        title,
        summary: og_description.or(description),
        body_length: u32::try_from(body_length).unwrap_or(u32::MAX),
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate_title(title: &str) -> String {
    if title.chars().count() > MAX_TITLE_CHARS {
        format!("{}...", title.chars().take(MAX_TITLE_CHARS).collect::<String>())
    } else {
        title.to_string()
    }
}

/// Non-whitespace characters of the text under `element`, skipping
/// [`IGNORED_ELEMENTS`].
fn visible_chars(element: ElementRef<'_>) -> usize {
    element
        .children()
        .map(|child| {
            if let Some(text) = child.value().as_text() {
                text.chars().filter(|c| !c.is_whitespace()).count()
            } else if let Some(el) = ElementRef::wrap(child) {
                if IGNORED_ELEMENTS.contains(&el.value().name()) {
                    0
                } else {
                    visible_chars(el)
                }
            } else {
                0
            }
        })
        .sum()
}
