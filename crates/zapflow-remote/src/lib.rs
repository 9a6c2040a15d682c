//! Automation-server adapter.
//!
//! Implements the `/status`, `/qr` and `/send` HTTP contract over `reqwest`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

use zapflow_core::{
    channel::{
        remote_server::FALLBACK_SEND_ERROR,
        types::{QrResponse, SendRequest, SendResponse, ServerStatus},
        RemoteServerApi,
    },
    errors::Error,
    Result,
};

const BODY_PREVIEW_CHARS: usize = 200;

#[derive(Clone, Debug)]
pub struct HttpRemoteServer {
    http: reqwest::Client,
}

impl HttpRemoteServer {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("zapflow/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::External(format!("http client build failed: {e}")))?;
        Ok(Self { http })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Remote(format!("request to {url} failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Remote(format!("{url} returned {status}")));
        }

        resp.json::<T>()
            .await
            .map_err(|e| Error::Remote(format!("invalid json from {url}: {e}")))
    }
}

#[async_trait]
impl RemoteServerApi for HttpRemoteServer {
    async fn status(&self, base_url: &str) -> Result<ServerStatus> {
        self.get_json(&format!("{base_url}/status")).await
    }

    async fn qr_code(&self, base_url: &str) -> Result<Option<String>> {
        let qr: QrResponse = self.get_json(&format!("{base_url}/qr")).await?;
        Ok(qr.qr_code.filter(|c| !c.trim().is_empty()))
    }

    async fn send(&self, base_url: &str, req: &SendRequest) -> Result<()> {
        let resp = self
            .http
            .post(format!("{base_url}/send"))
            .json(req)
            .send()
            .await
            .map_err(|e| Error::Remote(format!("request failed: {e}")))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| Error::Remote(format!("failed to read response: {e}")))?;

        send_outcome(status, &body)
    }
}

/// Interpret a `/send` response. Success needs a 2xx status *and* a truthy
/// `success` field.
fn send_outcome(status: StatusCode, body: &str) -> Result<()> {
    let parsed = serde_json::from_str::<SendResponse>(body);

    match parsed {
        Ok(r) if status.is_success() && r.success => Ok(()),
        Ok(r) => Err(Error::Remote(
            r.error
                .filter(|e| !e.trim().is_empty())
                .unwrap_or_else(|| FALLBACK_SEND_ERROR.to_string()),
        )),
        Err(_) if !status.is_success() => Err(Error::Remote(format!(
            "server returned {status}: {}",
            preview(body)
        ))),
        Err(e) => Err(Error::Remote(format!("invalid response from server: {e}"))),
    }
}

fn preview(body: &str) -> String {
    body.trim().chars().take(BODY_PREVIEW_CHARS).collect()
}
