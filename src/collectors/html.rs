//! Fetching and parsing helpers shared by the site collectors.

use crate::error::BoxError;
use crate::models::Post;
use crate::utils::collapse_whitespace;
use chrono::{DateTime, NaiveDate, Utc};
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

const USER_AGENT: &str = concat!("blog_digest/", env!("CARGO_PKG_VERSION"));

/// Build the HTTP client a collector owns for its lifetime.
pub fn http_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(30))
        .build()
}

/// GET `url` and return the body, giving up early if the run is cancelled.
#[instrument(level = "debug", skip(client, cancel))]
pub async fn fetch_html(
    client: &reqwest::Client,
    cancel: &CancellationToken,
    url: &str,
) -> Result<String, BoxError> {
    let fetch = async {
        let body = client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok::<_, reqwest::Error>(body)
    };

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(format!("fetch of {url} cancelled").into()),
        body = fetch => {
            let body = body?;
            debug!(bytes = body.len(), "Fetched page");
            Ok(body)
        }
    }
}

/// Convert the inner HTML of the first element matching `selector` to Markdown.
pub fn first_as_markdown(html: &str, selector: &Selector) -> Result<String, BoxError> {
    let document = Html::parse_document(html);
    let element = document
        .select(selector)
        .next()
        .ok_or("post body not found")?;
    to_markdown(&element.inner_html())
}

pub fn to_markdown(html: &str) -> Result<String, BoxError> {
    Ok(htmd::convert(html)?)
}

/// All text below `element`, whitespace collapsed.
pub fn element_text(element: ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<String>())
}

/// Only the text nodes that are direct children of `element`.
pub fn own_text(element: ElementRef<'_>) -> String {
    let text = element
        .children()
        .filter_map(|node| node.value().as_text().map(|t| t.to_string()))
        .collect::<String>();
    collapse_whitespace(&text)
}

/// Parse a date-only string with a chrono format, as midnight UTC.
pub fn parse_date(text: &str, format: &str) -> Option<DateTime<Utc>> {
    NaiveDate::parse_from_str(text.trim(), format)
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|datetime| datetime.and_utc())
}

/// Send every post downstream, in order.
pub async fn emit(tx: &mpsc::Sender<Post>, posts: Vec<Post>) -> Result<(), BoxError> {
    for post in posts {
        info!(
            path = %post.path,
            title = %post.title,
            published_at = ?post.published_at,
            "collect article"
        );
        tx.send(post)
            .await
            .map_err(|_| "post channel closed by receiver")?;
    }
    Ok(())
}
