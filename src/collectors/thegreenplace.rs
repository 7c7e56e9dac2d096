//! Collector for [Eli Bendersky's website](https://eli.thegreenplace.net/).
//!
//! The home page is an archive table: the first cell of each row holds a
//! `2024.11.03:` date, the link cell holds the absolute post URL.

use crate::collectors::Collector;
use crate::collectors::html::{element_text, emit, fetch_html, first_as_markdown, parse_date};
use crate::error::BoxError;
use crate::models::Post;
use async_trait::async_trait;
use itertools::Itertools;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

const HOME: &str = "https://eli.thegreenplace.net/";

static ROW: Lazy<Selector> =
    Lazy::new(|| Selector::parse("table.archive-list tbody > tr").expect("static selector"));
static LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("td a").expect("static selector"));
static CONTENT: Lazy<Selector> =
    Lazy::new(|| Selector::parse("#content article div.entry-content").expect("static selector"));

pub struct TheGreenPlace {
    client: reqwest::Client,
}

impl TheGreenPlace {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Collector for TheGreenPlace {
    fn name(&self) -> &str {
        "thegreenplace"
    }

    #[instrument(level = "info", skip_all)]
    async fn start(&self, cancel: &CancellationToken, tx: mpsc::Sender<Post>) -> Result<(), BoxError> {
        let html = fetch_html(&self.client, cancel, HOME).await?;
        let posts = parse_listing(&html);
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
        first_as_markdown(&html, &CONTENT)
    }
}

fn parse_listing(html: &str) -> Vec<Post> {
    let document = Html::parse_document(html);
    document
        .select(&ROW)
        .filter_map(|row| {
            let link = row.select(&LINK).next()?;
            let path = link.value().attr("href")?.trim();
            let title = element_text(link);
            if path.is_empty() || title.is_empty() {
                return None;
            }

            let published_at = row
                .children()
                .find_map(ElementRef::wrap)
                .and_then(|cell| parse_date(&element_text(cell), "%Y.%m.%d:"));
            if published_at.is_none() {
                warn!(%path, "parse datetime failed");
            }
            Some(Post::new(title, path, published_at))
        })
        .unique_by(|post| post.path.clone())
        .collect()
}
