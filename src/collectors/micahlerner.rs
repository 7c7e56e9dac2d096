//! Collector for [micahlerner.com](https://www.micahlerner.com/), paper reviews.
//!
//! Each list item wraps a paragraph holding the site-relative link followed
//! by ` - January 02, 2006`.

use crate::collectors::Collector;
use crate::collectors::html::{element_text, emit, fetch_html, first_as_markdown, own_text, parse_date};
use crate::error::BoxError;
use crate::models::Post;
use async_trait::async_trait;
use itertools::Itertools;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};
use url::Url;

const HOME: &str = "https://www.micahlerner.com/";

static ENTRY: Lazy<Selector> =
    Lazy::new(|| Selector::parse("body article section div ul li").expect("static selector"));
static PARAGRAPH: Lazy<Selector> = Lazy::new(|| Selector::parse("p").expect("static selector"));
static LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("a").expect("static selector"));
static CONTENT: Lazy<Selector> =
    Lazy::new(|| Selector::parse("body article #post-content").expect("static selector"));

pub struct MicahLerner {
    client: reqwest::Client,
}

impl MicahLerner {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Collector for MicahLerner {
    fn name(&self) -> &str {
        "micahlerner"
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
        first_as_markdown(&html, &CONTENT)
    }
}

fn parse_listing(html: &str, base: &Url) -> Vec<Post> {
    let document = Html::parse_document(html);
    document
        .select(&ENTRY)
        .filter_map(|entry| {
            let paragraph = entry.select(&PARAGRAPH).next()?;
            let link = paragraph.select(&LINK).next()?;
            let href = link.value().attr("href")?.trim();
            if href.is_empty() {
                return None;
            }
            let path = base.join(href).ok()?.to_string();
            let title = element_text(link);
            if title.is_empty() {
                return None;
            }

            let published_at = parse_date(&own_text(paragraph), "- %B %d, %Y");
            if published_at.is_none() {
                warn!(%path, "parse datetime failed");
            }
            Some(Post::new(title, path, published_at))
        })
        .unique_by(|post| post.path.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_parse_listing() {
        let html = r#"
            <html><body><article><section><div><ul>
              <li><p><a href="/2024/06/01/dynamo.html">Dynamo Revisited</a>
                - June 01, 2024</p></li>
              <li><p>no link</p></li>
              <li><p><a href="/2024/05/12/spanner.html">Spanner</a> - sometime</p></li>
            </ul></div></section></article></body></html>
        "#;
        let base = Url::parse(HOME).unwrap();
        let posts = parse_listing(html, &base);
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].title, "Dynamo Revisited");
        assert_eq!(posts[0].path, "https://www.micahlerner.com/2024/06/01/dynamo.html");
        assert_eq!(
            posts[0].published_at,
            Some(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(posts[1].published_at, None);
    }
}
