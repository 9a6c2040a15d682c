use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    channel::{
        port::{DeliveryChannel, RemoteServerApi},
        types::{DeliveryFailure, SendRequest},
    },
    domain::Contact,
    errors::Error,
    liaison::{LinkState, Liaison},
};

pub const FALLBACK_SEND_ERROR: &str = "unknown server error";

/// Forwards sends to the automation server once the liaison reports ready.
pub struct RemoteServerChannel {
    api: Arc<dyn RemoteServerApi>,
    liaison: Arc<Liaison>,
}

impl RemoteServerChannel {
    pub fn new(api: Arc<dyn RemoteServerApi>, liaison: Arc<Liaison>) -> Self {
        Self { api, liaison }
    }

    pub fn liaison(&self) -> &Arc<Liaison> {
        &self.liaison
    }
}

fn failure_reason(err: Error) -> String {
    let reason = match err {
        Error::Remote(reason) => reason,
        other => other.to_string(),
    };
    if reason.trim().is_empty() {
        FALLBACK_SEND_ERROR.to_string()
    } else {
        reason
    }
}

#[async_trait]
impl DeliveryChannel for RemoteServerChannel {
    async fn is_available(&self) -> bool {
        self.liaison.state().await == LinkState::Ready
    }

    async fn attempt_send(
        &self,
        contact: &Contact,
        message: &str,
    ) -> std::result::Result<(), DeliveryFailure> {
        if !self.is_available().await {
            return Err(DeliveryFailure::NotReady);
        }

        self.liaison
            .log(&format!("sending to {}...", contact.phone))
            .await;

        let req = SendRequest {
            phone: contact.phone.clone(),
            message: message.to_string(),
        };
        match self.api.send(self.liaison.base_url(), &req).await {
            Ok(()) => {
                self.liaison.log(&format!("sent: {}", contact.phone)).await;
                tracing::info!(phone = %contact.phone, "message sent");
                Ok(())
            }
            Err(e) => {
                let reason = failure_reason(e);
                self.liaison.log(&format!("error: {reason}")).await;
                tracing::warn!(phone = %contact.phone, %reason, "send failed");
                Err(DeliveryFailure::Rejected { reason })
            }
        }
    }
}
