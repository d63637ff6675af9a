use async_trait::async_trait;
use tokio::sync::mpsc;

/// Inbound chat message received from an external channel.
#[derive(Debug, Clone)]
pub struct ChannelInboundMessage {
    pub channel: String,
    /// Channel-specific sender id (Discord user id, phone number, ...).
    pub sender: String,
    /// Where the reply goes (Discord channel id, chat id, ...).
    pub reply_target: String,
    pub text: String,
}

impl ChannelInboundMessage {
    /// Actor id used for rate gating and history. Scoped by channel so the
    /// same numeric id on two platforms never shares a quota.
    #[must_use]
    pub fn actor_id(&self) -> String {
        format!("{}:{}", self.channel, self.sender)
    }
}

/// Reply sent back to a channel.
#[derive(Debug, Clone)]
pub struct ChannelOutboundMessage {
    pub reply_target: String,
    pub text: String,
}

/// Channel adapter contract. New channels only need to implement this trait.
#[async_trait]
pub trait ChannelAdapter: Send + Sync {
    /// Stable channel identifier (e.g. `discord`).
    fn id(&self) -> &'static str;

    /// Send a reply to the channel-specific target.
    async fn send(&self, message: ChannelOutboundMessage) -> anyhow::Result<()>;

    /// Start receiving inbound messages and forwarding them to the runtime.
    async fn run(&self, inbound_tx: mpsc::Sender<ChannelInboundMessage>) -> anyhow::Result<()>;

    /// Best-effort health probe.
    async fn health_check(&self) -> anyhow::Result<bool>;
}
