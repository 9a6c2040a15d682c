use std::sync::Arc;

use zapflow_browser::{PrintOpener, SystemOpener, PRINT_PROGRAM};
use zapflow_core::{channel::LinkOpener, config::Config, session::Session};
use zapflow_remote::HttpRemoteServer;

mod console;
mod render;

#[tokio::main]
async fn main() -> Result<(), zapflow_core::Error> {
    zapflow_core::logging::init("zapflow")?;

    let cfg = Arc::new(Config::load()?);

    let opener: Arc<dyn LinkOpener> = match cfg.opener_program.as_deref() {
        Some(PRINT_PROGRAM) => Arc::new(PrintOpener),
        program => Arc::new(SystemOpener::new(program)),
    };
    let remote = Arc::new(HttpRemoteServer::new(cfg.http_timeout)?);

    let session = Arc::new(Session::new(cfg.clone(), opener, remote));
    if let Some(template) = cfg.load_template()? {
        session.set_template(template).await;
    }
    session.apply_config(cfg.session_config()).await?;

    let result = console::run(cfg, session.clone())
        .await
        .map_err(|e| zapflow_core::Error::External(format!("console failed: {e}")));

    session.shutdown().await;
    result
}
