use std::sync::Arc;

use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::{
    channel::{
        port::{DeliveryChannel, LinkOpener},
        types::DeliveryFailure,
    },
    domain::Contact,
};

pub const DEFAULT_COMPOSE_URL: &str = "https://web.whatsapp.com/send";

/// Characters left alone by JavaScript's `encodeURIComponent`.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Build the web-chat compose URL for one contact.
pub fn compose_url(base: &str, phone: &str, message: &str) -> String {
    let text = utf8_percent_encode(message, URI_COMPONENT);
    format!("{base}?phone={phone}&text={text}")
}

/// Hands each message to an external chat client via a compose link.
///
/// Success only means the host accepted the open request; there is no
/// delivery confirmation on this channel.
pub struct DirectLinkChannel {
    opener: Arc<dyn LinkOpener>,
    compose_base: String,
}

impl DirectLinkChannel {
    pub fn new(opener: Arc<dyn LinkOpener>, compose_base: impl Into<String>) -> Self {
        Self {
            opener,
            compose_base: compose_base.into(),
        }
    }
}

#[async_trait]
impl DeliveryChannel for DirectLinkChannel {
    async fn is_available(&self) -> bool {
        true
    }

    async fn attempt_send(
        &self,
        contact: &Contact,
        message: &str,
    ) -> std::result::Result<(), DeliveryFailure> {
        let url = compose_url(&self.compose_base, &contact.phone, message);
        match self.opener.open(&url).await {
            Ok(()) => {
                tracing::info!(phone = %contact.phone, "compose link opened");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(phone = %contact.phone, error = %e, "compose link refused");
                Err(DeliveryFailure::PopupBlocked)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{errors::Error, Result};
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeOpener {
        refuse: bool,
        opened: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LinkOpener for FakeOpener {
        async fn open(&self, url: &str) -> Result<()> {
            if self.refuse {
                return Err(Error::External("blocked".to_string()));
            }
            self.opened.lock().unwrap().push(url.to_string());
            Ok(())
        }
    }

    #[test]
    fn compose_url_encodes_like_uri_component() {
        let url = compose_url(DEFAULT_COMPOSE_URL, "5511999998888", "Olá João, tudo bem?\n(oi)");
        assert_eq!(
            url,
            "https://web.whatsapp.com/send?phone=5511999998888&text=Ol%C3%A1%20Jo%C3%A3o%2C%20tudo%20bem%3F%0A(oi)"
        );
    }

    #[tokio::test]
    async fn accepted_open_is_success() {
        let opener = Arc::new(FakeOpener::default());
        let ch = DirectLinkChannel::new(opener.clone(), DEFAULT_COMPOSE_URL);
        let c = Contact::new("11999998888", "5511999998888", None);
        assert!(ch.is_available().await);
        ch.attempt_send(&c, "hi there").await.unwrap();
        let opened = opener.opened.lock().unwrap().clone();
        assert_eq!(opened, vec!["https://web.whatsapp.com/send?phone=5511999998888&text=hi%20there"]);
    }

    #[tokio::test]
    async fn refused_open_is_popup_blocked() {
        let opener = Arc::new(FakeOpener {
            refuse: true,
            ..Default::default()
        });
        let ch = DirectLinkChannel::new(opener, DEFAULT_COMPOSE_URL);
        let c = Contact::new("11999998888", "5511999998888", None);
        assert_eq!(
            ch.attempt_send(&c, "hi").await,
            Err(DeliveryFailure::PopupBlocked)
        );
    }
}
