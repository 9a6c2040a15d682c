use std::{path::Path, sync::Arc, time::Duration};

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use zapflow_core::{
    config::Config,
    domain::{ChannelMode, SessionConfig},
    liaison::LinkState,
    session::{Session, TickReport},
};

use crate::render;

/// Line that ends a `paste` block.
const PASTE_TERMINATOR: &str = ".";

enum Flow {
    Reply(String),
    Quit,
}

fn parse_command(text: &str) -> (String, String) {
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let cmd = first.trim_start_matches('/').to_lowercase();
    (cmd, rest)
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes" | "s" | "sim")
}

/// Single-line templates may spell line breaks as a literal `\n`.
fn unescape_template(text: &str) -> String {
    text.replace("\\n", "\n")
}

pub async fn run(cfg: Arc<Config>, session: Arc<Session>) -> anyhow::Result<()> {
    println!(
        "zapflow started ({} mode). Type `help` for commands.",
        cfg.mode.as_str()
    );

    let cancel = CancellationToken::new();
    let ticker = spawn_ticker(session.clone(), cancel.clone());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let result = loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break Ok(()),
            Err(e) => break Err(e.into()),
        };

        let (cmd, rest) = parse_command(&line);
        if cmd.is_empty() {
            continue;
        }

        match handle(&session, &mut lines, &cmd, &rest).await {
            Ok(Flow::Reply(text)) => println!("{text}"),
            Ok(Flow::Quit) => break Ok(()),
            Err(e) => println!("error: {e}"),
        }
    };

    cancel.cancel();
    let _ = ticker.await;
    result
}

/// Drive auto-play once per second and announce server link changes.
fn spawn_ticker(session: Arc<Session>, cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_state: Option<LinkState> = None;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {}
            }

            match session.tick().await {
                Ok(TickReport::Dispatched(outcome)) => {
                    println!("[auto] {}", render::send_outcome(&outcome));
                    let view = session.view().await;
                    if view.finished {
                        println!("[auto] finished! run `reset` to start over");
                    } else if !view.auto_play {
                        println!("[auto] auto-play stopped");
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::warn!("auto-play tick failed: {e}"),
            }

            let state = session.link_state().await;
            if state != last_state {
                match state {
                    Some(LinkState::QrPending) => {
                        println!("[server] pairing required; run `qr` to get the code")
                    }
                    Some(LinkState::Ready) => println!("[server] ready"),
                    Some(LinkState::Disconnected) if last_state.is_some() => {
                        println!("[server] disconnected")
                    }
                    _ => {}
                }
                last_state = state;
            }
        }
    })
}

async fn handle<R>(
    session: &Session,
    lines: &mut Lines<R>,
    cmd: &str,
    rest: &str,
) -> anyhow::Result<Flow>
where
    R: AsyncBufRead + Unpin,
{
    let reply = match cmd {
        "help" | "?" => render::HELP.to_string(),
        "quit" | "exit" => return Ok(Flow::Quit),

        "import" => {
            if rest.is_empty() {
                anyhow::bail!("usage: import <file>");
            }
            let text = tokio::fs::read_to_string(Path::new(rest)).await?;
            import(session, &text).await?
        }
        "paste" => {
            println!("paste contacts, one per line; finish with a line containing only {PASTE_TERMINATOR}");
            let mut text = String::new();
            while let Some(line) = lines.next_line().await? {
                if line.trim() == PASTE_TERMINATOR {
                    break;
                }
                text.push_str(&line);
                text.push('\n');
            }
            import(session, &text).await?
        }

        "template" => {
            if rest.is_empty() {
                session.template().await
            } else {
                session.set_template(unescape_template(rest)).await;
                "template updated".to_string()
            }
        }
        "template-file" => {
            if rest.is_empty() {
                anyhow::bail!("usage: template-file <file>");
            }
            let text = tokio::fs::read_to_string(Path::new(rest)).await?;
            session.set_template(text.trim_end()).await;
            "template updated".to_string()
        }

        "mode" => {
            let mut parts = rest.split_whitespace();
            let Some(mode) = parts.next().and_then(ChannelMode::parse) else {
                anyhow::bail!("usage: mode web | mode server [url]");
            };
            let mut config = session.config().await;
            config.mode = mode;
            if let Some(url) = parts.next() {
                config.server_url = url.to_string();
            }
            apply(session, config).await?
        }

        "start" => {
            session.start().await?;
            render::status(&session.view().await)
        }
        "send" => {
            let outcome = session.send_current().await?;
            render::send_outcome(&outcome)
        }
        "skip" => match session.skip_current().await {
            Some(c) => format!("skipped: {}", render::contact_line(&c)),
            None => "nothing left to skip".to_string(),
        },
        "auto" => {
            if !session.is_started().await {
                anyhow::bail!("run `start` first");
            }
            if session.toggle_auto_play().await {
                let view = session.view().await;
                format!(
                    "auto-play on: first send in {}s, then every {}s",
                    view.countdown, view.auto_delay
                )
            } else {
                "auto-play off".to_string()
            }
        }

        "status" => render::status(&session.view().await),
        "list" => {
            let view = session.view().await;
            if view.contacts.is_empty() {
                "no contacts loaded".to_string()
            } else {
                render::list(&view)
            }
        }
        "log" => match session.view().await.link {
            Some(link) if !link.log.is_empty() => link.log.join("\n"),
            Some(_) => "no server activity yet".to_string(),
            None => "no server log in browser mode".to_string(),
        },
        "qr" => {
            let qr = session.view().await.link.and_then(|l| l.qr_code);
            match (qr, rest.is_empty()) {
                (None, _) => "no pairing code available".to_string(),
                (Some(code), true) => code,
                (Some(code), false) => {
                    tokio::fs::write(Path::new(rest), code.as_bytes()).await?;
                    format!("pairing code written to {rest}")
                }
            }
        }

        "reset" => {
            let total = session.view().await.contacts.len();
            println!("discard {total} contacts and all progress? [y/N]");
            let answer = lines.next_line().await?.unwrap_or_default();
            if session.reset(is_yes(&answer)).await {
                "list cleared".to_string()
            } else {
                "reset cancelled".to_string()
            }
        }

        other => format!("unknown command `{other}`; type `help`"),
    };

    Ok(Flow::Reply(reply))
}

async fn import(session: &Session, text: &str) -> anyhow::Result<String> {
    let report = session.import_text(text).await?;
    let mut reply = format!("{} contacts loaded", report.entries.len());
    if report.dropped > 0 {
        reply.push_str(&format!(", {} lines ignored", report.dropped));
    }
    reply.push_str("; run `start` to begin");
    Ok(reply)
}

async fn apply(session: &Session, config: SessionConfig) -> anyhow::Result<String> {
    let reply = match config.mode {
        ChannelMode::DirectLink => "mode: browser".to_string(),
        ChannelMode::RemoteServer => format!("mode: server at {}", config.server_url),
    };
    session.apply_config(config).await?;
    Ok(reply)
}
