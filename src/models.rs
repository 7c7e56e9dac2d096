//! Data models shared by the collectors, the framework and the store.
//!
//! - [`Post`]: an in-flight article as emitted by a collector
//! - [`ContentResolver`]: the deferred handle that fetches a post's body
//! - [`SummaryResult`]: the persisted, one-line-per-record summary

use crate::collectors::Collector;
use crate::error::BoxError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, info_span};

/// A blog post discovered by a collector, before summarization.
///
/// `domain` is overwritten by the framework with the emitting collector's
/// name, and `content_resolver` is bound by the framework as well; values
/// a collector sets for either are not trusted.
#[derive(Debug, Clone, Default)]
pub struct Post {
    /// Name of the collector that produced this post.
    pub domain: String,
    /// Headline. Never empty for a post that reaches the merged stream.
    pub title: String,
    /// Stable identity of the post, usually its absolute URL.
    pub path: String,
    /// Best-effort publication time; `None` when the site gave nothing parseable.
    pub published_at: Option<DateTime<Utc>>,
    /// Deferred body fetch, bound by the framework.
    pub content_resolver: Option<ContentResolver>,
}

impl Post {
    pub fn new(
        title: impl Into<String>,
        path: impl Into<String>,
        published_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            title: title.into(),
            path: path.into(),
            published_at,
            ..Default::default()
        }
    }

    /// Fetch the full body (Markdown or HTML) through the owning collector.
    ///
    /// This usually costs a network round trip, so callers should only
    /// invoke it for posts that still need a summary.
    pub async fn resolve_content(&self) -> Result<String, BoxError> {
        match &self.content_resolver {
            Some(resolver) => resolver.resolve().await,
            None => Err(format!(
                "no content resolver bound, domain: {}, path: {}",
                self.domain, self.path
            )
            .into()),
        }
    }
}

/// Handle that resolves one post's content against the collector that emitted it.
#[derive(Clone)]
pub struct ContentResolver {
    collector: Arc<dyn Collector>,
    post: Box<Post>,
    cancel: CancellationToken,
}

impl ContentResolver {
    pub(crate) fn new(collector: Arc<dyn Collector>, post: &Post, cancel: CancellationToken) -> Self {
        let post = Post {
            content_resolver: None,
            ..post.clone()
        };
        Self {
            collector,
            post: Box::new(post),
            cancel,
        }
    }

    pub async fn resolve(&self) -> Result<String, BoxError> {
        let span = info_span!("collector", collector = %self.collector.name());
        self.collector
            .resolve_post_content(&self.cancel, &self.post)
            .instrument(span)
            .await
    }
}

impl fmt::Debug for ContentResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentResolver")
            .field("collector", &self.collector.name())
            .field("path", &self.post.path)
            .finish()
    }
}

/// A summarized post, persisted as one JSON line.
///
/// Records written before `domain` and `path` existed still decode; the
/// missing fields come back empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryResult {
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub path: String,
    pub title: String,
    pub summary: String,
    #[serde(default, with = "published_at")]
    pub published_at: Option<DateTime<Utc>>,
}

impl SummaryResult {
    pub fn from_post(post: &Post, summary: String) -> Self {
        Self {
            domain: post.domain.clone(),
            path: post.path.clone(),
            title: post.title.clone(),
            summary,
            published_at: post.published_at,
        }
    }
}

/// RFC 3339 timestamps, with the year-one zero time standing in for "unknown".
mod published_at {
    use chrono::{DateTime, Datelike, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer, de};

    const ZERO_TIME: &str = "0001-01-01T00:00:00Z";

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(t) => serializer.serialize_str(&t.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            None => serializer.serialize_str(ZERO_TIME),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let Some(raw) = Option::<String>::deserialize(deserializer)? else {
            return Ok(None);
        };
        let parsed = DateTime::parse_from_rfc3339(&raw).map_err(de::Error::custom)?;
        if parsed.year() <= 1 {
            return Ok(None);
        }
        Ok(Some(parsed.with_timezone(&Utc)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> SummaryResult {
        SummaryResult {
            domain: "muratbuffalo".to_string(),
            path: "https://muratbuffalo.blogspot.com/2024/05/post.html".to_string(),
            title: "Post".to_string(),
            summary: "A summary".to_string(),
            published_at: Some(Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()),
        }
    }

    #[test]
    fn test_summary_result_wire_format() {
        let json = serde_json::to_string(&sample()).unwrap();
        assert_eq!(
            json,
            r#"{"domain":"muratbuffalo","path":"https://muratbuffalo.blogspot.com/2024/05/post.html","title":"Post","summary":"A summary","published_at":"2024-05-01T00:00:00Z"}"#
        );
    }

    #[test]
    fn test_missing_published_at_uses_zero_time() {
        let mut result = sample();
        result.published_at = None;
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.ends_with(r#""published_at":"0001-01-01T00:00:00Z"}"#));

        let back: SummaryResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back.published_at, None);
    }

    #[test]
    fn test_offset_timestamps_normalize_to_utc() {
        let line = r#"{"domain":"d","path":"p","title":"t","summary":"s","published_at":"2024-05-01T08:00:00+08:00"}"#;
        let result: SummaryResult = serde_json::from_str(line).unwrap();
        assert_eq!(
            result.published_at,
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_legacy_record_without_identity_fields() {
        let line = r#"{"title":"Old","summary":"s","published_at":"2024-01-02T00:00:00Z"}"#;
        let result: SummaryResult = serde_json::from_str(line).unwrap();
        assert_eq!(result.domain, "");
        assert_eq!(result.path, "");
        assert_eq!(result.title, "Old");
    }

    #[tokio::test]
    async fn test_resolve_without_resolver_fails() {
        let post = Post::new("A", "/a", None);
        let err = post.resolve_content().await.unwrap_err();
        assert!(err.to_string().contains("no content resolver bound"));
    }
}
