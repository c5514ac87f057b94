//! Lifecycle interface for long-lived components.
//!
//! Every managed task (feed consumer, ticker, status reporter, batch
//! processor) implements the same small contract instead of ad hoc
//! stop/restart conventions, so the supervisor can start and wind them
//! down uniformly.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

#[async_trait]
pub trait Service: Send {
    /// Stable name used in logs.
    fn name(&self) -> &'static str;

    /// Run until completion or until `shutdown` is cancelled.
    ///
    /// Implementations decide what cancellation means for them: the feed
    /// task stops accepting records, while the batch processor ignores the
    /// token and drains its queue until the producers hang up.
    async fn run(self: Box<Self>, shutdown: CancellationToken) -> anyhow::Result<()>;
}
