//! Collector for [simonwillison.net](https://simonwillison.net/).
//!
//! Recent entries are listed in the sidebar as `<li><a href="/2025/May/2/slug/">Title</a> - May 2, 2025</li>`.
//! The date is the item's own text; Simon abbreviates September as `Sept`.

use crate::collectors::Collector;
use crate::collectors::html::{element_text, emit, fetch_html, own_text, parse_date, to_markdown};
use crate::error::BoxError;
use crate::models::Post;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use itertools::Itertools;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};
use url::Url;

const HOME: &str = "https://simonwillison.net/";

static ENTRY: Lazy<Selector> =
    Lazy::new(|| Selector::parse("#secondary ul li").expect("static selector"));
static LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("a").expect("static selector"));
static CONTENT: Lazy<Selector> =
    Lazy::new(|| Selector::parse("#primary div.entry").expect("static selector"));

pub struct SimonWillison {
    client: reqwest::Client,
}

impl SimonWillison {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Collector for SimonWillison {
    fn name(&self) -> &str {
        "simonwillison"
    }

    #[instrument(level = "info", skip_all)]
    async fn start(&self, cancel: &CancellationToken, tx: mpsc::Sender<Post>) -> Result<(), BoxError> {
        let base = Url::parse(HOME)?;
        let html = fetch_html(&self.client, cancel, HOME).await?;
        let posts = parse_listing(&html, &base);
        info!(count = posts.len(), source = HOME, "Indexed posts");
        emit(&tx, posts).await
    }

    #[instrument(level = "info", skip_all, fields(path = %post.path))]
    async fn resolve_post_content(
        &self,
        cancel: &CancellationToken,
        post: &Post,
    ) -> Result<String, BoxError> {
        let html = fetch_html(&self.client, cancel, &post.path).await?;
        parse_content(&html)
    }
}

fn parse_listing(html: &str, base: &Url) -> Vec<Post> {
    let document = Html::parse_document(html);
    document
        .select(&ENTRY)
        .filter_map(|entry| {
            let link = entry.select(&LINK).next()?;
            let href = link.value().attr("href")?.trim();
            if href.is_empty() {
                return None;
            }
            let path = base.join(href).ok()?.to_string();
            let title = element_text(link);
            if title.is_empty() {
                return None;
            }

            let published_at = parse_published_at(entry);
            if published_at.is_none() {
                warn!(%path, "parse datetime failed");
            }
            Some(Post::new(title, path, published_at))
        })
        .unique_by(|post| post.path.clone())
        .collect()
}

fn parse_published_at(entry: ElementRef<'_>) -> Option<DateTime<Utc>> {
    let text = own_text(entry).replace("Sept", "Sep").replace('.', "");
    let text = text.trim_start_matches('-').trim();
    parse_date(text, "%b %d, %Y")
}

/// The article body is the first child of the entry container.
fn parse_content(html: &str) -> Result<String, BoxError> {
    let document = Html::parse_document(html);
    let entry = document
        .select(&CONTENT)
        .next()
        .ok_or("post entry not found")?;
    let body = entry
        .children()
        .find_map(ElementRef::wrap)
        .ok_or("post entry is empty")?;
    to_markdown(&body.inner_html())
}
