use color_eyre::eyre::Result;

/// Where notification text ends up. Sends are fire-and-forget: an `Ok` only
/// means the message left this process.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ChatboxSink: Send + Sync {
    async fn notify(&self, text: &str) -> Result<()>;
}
