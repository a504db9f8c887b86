use anyhow::Result;
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

/// Platform text-to-speech used for prompts and feedback.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SpeechOutput: Send + Sync {
    /// Speaks `text` and resolves once the utterance has finished.
    async fn speak(&self, text: &str) -> Result<()>;

    /// Stops whatever is being spoken right now.
    fn cancel(&self);
}
