//! Collector for [Metadata](https://muratbuffalo.blogspot.com), Murat Demirbas' blog.
//!
//! The blogspot front page lists full posts; each `div.post` carries the
//! title link and a `time.published` element like `May 08, 2025`.

use crate::collectors::Collector;
use crate::collectors::html::{element_text, emit, fetch_html, first_as_markdown, parse_date};
use crate::error::BoxError;
use crate::models::Post;
use async_trait::async_trait;
use itertools::Itertools;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

const HOME: &str = "https://muratbuffalo.blogspot.com";

static POST: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div.Blog div.blog-posts div.post").expect("static selector"));
static TITLE_LINK: Lazy<Selector> =
    Lazy::new(|| Selector::parse("h3.post-title a").expect("static selector"));
static PUBLISHED: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("div.post-header span.post-timestamp time.published").expect("static selector")
});
static BODY: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div.post div.post-body").expect("static selector"));

pub struct MuratBuffalo {
    client: reqwest::Client,
}

impl MuratBuffalo {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Collector for MuratBuffalo {
    fn name(&self) -> &str {
        "muratbuffalo"
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
        first_as_markdown(&html, &BODY)
    }
}

fn parse_listing(html: &str) -> Vec<Post> {
    let document = Html::parse_document(html);
    document
        .select(&POST)
        .filter_map(|entry| {
            let link = entry.select(&TITLE_LINK).next()?;
            let path = link.value().attr("href")?.trim();
            let title = element_text(link);
            if path.is_empty() || title.is_empty() {
                return None;
            }

            let published_at = entry
                .select(&PUBLISHED)
                .next()
                .and_then(|t| parse_date(&element_text(t), "%B %d, %Y"));
            if published_at.is_none() {
                warn!(%path, "parse datetime failed");
            }
            Some(Post::new(title, path, published_at))
        })
        .unique_by(|post| post.path.clone())
        .collect()
}
