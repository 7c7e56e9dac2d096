//! Site collectors: one pluggable adapter per blog.
//!
//! Every collector implements the same four-method [`Collector`] contract.
//! The framework owns scheduling, provenance and content binding; a
//! collector only knows how to list one site's posts and how to fetch a
//! single post body.
//!
//! # Registered Sites
//!
//! | Name | Module | Listing | Date format |
//! |------|--------|---------|-------------|
//! | `muratbuffalo` | [`muratbuffalo`] | blogspot front page | `January 02, 2006` |
//! | `simonwillison` | [`simonwillison`] | sidebar of recent entries | `- Jan. 2, 2006` |
//! | `thegreenplace` | [`thegreenplace`] | archive table | `2006.01.02:` |
//! | `micahlerner` | [`micahlerner`] | home page list | `- January 02, 2006` |
//!
//! Collectors are registered explicitly through [`registry`]; there is no
//! global auto-registration.

use crate::error::BoxError;
use crate::models::Post;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

pub mod html;
pub mod micahlerner;
pub mod muratbuffalo;
pub mod simonwillison;
pub mod thegreenplace;

/// The capability set every site adapter provides.
///
/// `start` emits zero or more posts on `tx` and then returns; dropping
/// `tx` on return is what signals the end of this collector's stream.
/// A collector must never emit a post with an empty title.
///
/// `resolve_post_content` may be called any number of times, before or
/// after `start` has returned.
#[async_trait]
pub trait Collector: Send + Sync {
    /// Stable, unique, non-empty name. Becomes the `domain` of every post.
    fn name(&self) -> &str;

    /// One-time setup before the run starts.
    async fn initialize(&self, _cancel: &CancellationToken) -> Result<(), BoxError> {
        Ok(())
    }

    async fn start(&self, cancel: &CancellationToken, tx: mpsc::Sender<Post>) -> Result<(), BoxError>;

    async fn resolve_post_content(
        &self,
        cancel: &CancellationToken,
        post: &Post,
    ) -> Result<String, BoxError>;
}

/// All known collectors, in registration order.
pub fn registry() -> Result<Vec<Arc<dyn Collector>>, reqwest::Error> {
    let client = html::http_client()?;
    let collectors: Vec<Arc<dyn Collector>> = vec![
        Arc::new(muratbuffalo::MuratBuffalo::new(client.clone())),
        Arc::new(simonwillison::SimonWillison::new(client.clone())),
        Arc::new(thegreenplace::TheGreenPlace::new(client.clone())),
        Arc::new(micahlerner::MicahLerner::new(client)),
    ];
    Ok(collectors)
}

/// Restrict `collectors` to the names in `only`, keeping registration order.
///
/// An empty `only` keeps everything. Names that match nothing are logged.
pub fn select(collectors: Vec<Arc<dyn Collector>>, only: &[String]) -> Vec<Arc<dyn Collector>> {
    if only.is_empty() {
        return collectors;
    }
    for name in only {
        if !collectors.iter().any(|c| c.name() == name) {
            warn!(collector = %name, "Unknown collector requested; ignoring");
        }
    }
    collectors
        .into_iter()
        .filter(|c| only.iter().any(|name| name == c.name()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_names_are_unique() {
        let collectors = registry().unwrap();
        let mut names: Vec<&str> = collectors.iter().map(|c| c.name()).collect();
        let total = names.len();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), total);
        assert_eq!(total, 4);
    }

    #[test]
    fn test_select_keeps_registration_order() {
        let only = vec!["thegreenplace".to_string(), "muratbuffalo".to_string()];
        let selected = select(registry().unwrap(), &only);
        let names: Vec<&str> = selected.iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["muratbuffalo", "thegreenplace"]);
    }

    #[test]
    fn test_select_empty_keeps_all() {
        let selected = select(registry().unwrap(), &[]);
        assert_eq!(selected.len(), 4);
    }

    #[test]
    fn test_select_unknown_name_matches_nothing() {
        let selected = select(registry().unwrap(), &["nope".to_string()]);
        assert!(selected.is_empty());
    }
}
