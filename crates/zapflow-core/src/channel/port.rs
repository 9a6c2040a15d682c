use async_trait::async_trait;

use crate::{
    channel::types::{DeliveryFailure, SendRequest, ServerStatus},
    domain::Contact,
    Result,
};

/// A way of delivering one rendered message to one contact.
///
/// Implementations never retry; the queue decides what a failure means.
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    /// Whether a send may be attempted right now.
    async fn is_available(&self) -> bool;

    async fn attempt_send(
        &self,
        contact: &Contact,
        message: &str,
    ) -> std::result::Result<(), DeliveryFailure>;
}

/// Host capability to open a URL in a new browsing context.
#[async_trait]
pub trait LinkOpener: Send + Sync {
    /// `Err` means the host refused to open the URL.
    async fn open(&self, url: &str) -> Result<()>;
}

/// HTTP contract of the external automation server.
///
/// `base_url` has no trailing slash.
#[async_trait]
pub trait RemoteServerApi: Send + Sync {
    async fn status(&self, base_url: &str) -> Result<ServerStatus>;

    /// Pairing image payload (e.g. a data URI), if the server has one.
    async fn qr_code(&self, base_url: &str) -> Result<Option<String>>;

    /// `Err(Error::Remote(reason))` for every failure, including transport
    /// errors and a falsy `success` field.
    async fn send(&self, base_url: &str, req: &SendRequest) -> Result<()>;
}
