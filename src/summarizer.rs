//! Post summarization.
//!
//! The driver only depends on the [`Summarizer`] capability. The shipped
//! implementation, [`TextSummarizer`], resolves the post body through its
//! bound content resolver and asks an OpenAI-compatible model for a
//! summary via `awful_aj`.

use crate::api::ask_with_backoff;
use crate::models::Post;
use awful_aj::{config, config::AwfulJadeConfig, config_dir, template, template::ChatTemplate};
use std::error::Error;
use std::path::PathBuf;
use tracing::{debug, info, instrument};

/// Turns one post into a natural-language summary.
///
/// Failures are per post; the caller logs them and moves on.
pub trait Summarizer {
    async fn summary(&self, post: &Post) -> Result<String, Box<dyn Error>>;
}

pub struct TextSummarizer {
    config: AwfulJadeConfig,
    template: ChatTemplate,
}

impl TextSummarizer {
    /// Load the LLM endpoint configuration and the chat template.
    ///
    /// `config_path` defaults to `config.yaml` in the `awful_aj` config
    /// directory. The template supplies the system prompt.
    #[instrument(level = "info", skip_all, fields(template = %template_name))]
    pub async fn load(
        config_path: Option<&str>,
        template_name: &str,
    ) -> Result<Self, Box<dyn Error>> {
        let template = template::load_template(template_name).await?;
        info!(template = template_name, "Loaded template");

        let config_path = match config_path {
            Some(path) => PathBuf::from(path),
            None => config_dir()?.join("config.yaml"),
        };
        let config_path = config_path
            .to_str()
            .ok_or("LLM config path is not valid UTF-8")?;
        let config = config::load_config(config_path)?;
        info!(config_path, "Loaded configuration");

        Ok(Self { config, template })
    }
}

impl Summarizer for TextSummarizer {
    #[instrument(level = "info", skip_all, fields(domain = %post.domain, path = %post.path))]
    async fn summary(&self, post: &Post) -> Result<String, Box<dyn Error>> {
        let content = post.resolve_content().await.map_err(|e| -> Box<dyn Error> {
            format!(
                "got content failed: {e}, domain: {}, path: {}",
                post.domain, post.path
            )
            .into()
        })?;
        if content.trim().is_empty() {
            return Err(format!(
                "got empty content, domain: {}, path: {}",
                post.domain, post.path
            )
            .into());
        }
        debug!(bytes = content.len(), "Resolved post content");

        ask_with_backoff(&self.config, &summary_prompt(&content), &self.template).await
    }
}

pub fn summary_prompt(content: &str) -> String {
    format!("Please summarize the following blog post (with Markdown or HTML format): {content}")
}
