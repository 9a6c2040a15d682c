use serde::{Deserialize, Serialize};

/// Why a single send attempt did not go through.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryFailure {
    /// The host refused to open the compose link.
    #[error("the system refused to open the compose link; allow pop-ups or check the opener")]
    PopupBlocked,

    /// Remote-server mode, but the server has not reported ready.
    #[error("server is not ready")]
    NotReady,

    /// The server rejected the send or could not be reached.
    #[error("{reason}")]
    Rejected { reason: String },
}

impl DeliveryFailure {
    /// Refusals leave the contact pending; only rejections mark it errored.
    pub fn marks_contact_error(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }
}

/// `GET /status` body.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerStatus {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub is_ready: bool,
}

impl ServerStatus {
    pub const QR_READY: &'static str = "qr_ready";

    pub fn qr_ready(&self) -> bool {
        !self.is_ready && self.status == Self::QR_READY
    }
}

/// `GET /qr` body.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QrResponse {
    #[serde(default)]
    pub qr_code: Option<String>,
}

/// `POST /send` body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendRequest {
    pub phone: String,
    pub message: String,
}

/// `POST /send` response.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
}
