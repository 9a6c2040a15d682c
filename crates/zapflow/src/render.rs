use zapflow_core::{
    domain::{ChannelMode, Contact, ContactStatus},
    liaison::LinkState,
    phone::format_display,
    session::{SendOutcome, SessionView},
};

pub const HELP: &str = "\
Commands (leading / optional):
  import <file>         load contacts from a file (one per line)
  paste                 paste contacts, finish with a line containing only .
  template <text>       set the message template ({nome} = contact name)
  template-file <file>  load the template from a file
  template              show the current template
  mode web              open a compose link per contact
  mode server [url]     send through the automation server
  start                 begin dispatching
  send                  send to the current contact
  skip                  skip the current contact
  auto                  toggle auto-play
  status                show progress and the current contact
  list                  show every contact
  log                   show the server activity log
  qr [file]             print or save the pairing image
  reset                 discard the list (asks for confirmation)
  help                  this text
  quit                  exit";

fn status_mark(status: ContactStatus) -> &'static str {
    match status {
        ContactStatus::Pending => " ",
        ContactStatus::Sent => "✓",
        ContactStatus::Skipped => "-",
        ContactStatus::Error => "✗",
    }
}

pub fn contact_line(contact: &Contact) -> String {
    let name = contact.name.as_deref().unwrap_or("(no name)");
    format!("{name} {}", format_display(&contact.phone))
}

pub fn mode_label(view: &SessionView) -> String {
    match view.config.mode {
        ChannelMode::DirectLink => "browser".to_string(),
        ChannelMode::RemoteServer => {
            let state = view
                .link
                .as_ref()
                .map(|l| l.state)
                .unwrap_or(LinkState::Disconnected);
            format!("server {} ({state})", view.config.server_url)
        }
    }
}

pub fn status(view: &SessionView) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "mode: {} | progress: {}% ({}/{}) | sent {} skipped {} error {}\n",
        mode_label(view),
        view.progress_percent,
        view.counts.done(),
        view.counts.total(),
        view.counts.sent,
        view.counts.skipped,
        view.counts.error,
    ));

    if view.contacts.is_empty() {
        out.push_str("no contacts loaded\n");
        return out;
    }
    if !view.started {
        out.push_str(&format!(
            "{} contacts loaded; run `start` to begin\n",
            view.contacts.len()
        ));
    }

    match (view.current_index, view.finished) {
        (_, true) => out.push_str("finished! run `reset` to start over\n"),
        (Some(i), false) => {
            let c = &view.contacts[i];
            out.push_str(&format!("current [{}]: {}\n", i + 1, contact_line(c)));
            if let Some(msg) = &view.current_message {
                out.push_str("---\n");
                out.push_str(msg);
                out.push_str("\n---\n");
            }
        }
        (None, false) => {}
    }

    if view.auto_play {
        out.push_str(&format!("auto-play on, next send in {}s\n", view.countdown));
    }
    if view.config.mode == ChannelMode::RemoteServer && !view.channel_available {
        out.push_str("server not ready; sends are on hold\n");
    }
    if let Some(err) = &view.last_error {
        out.push_str(&format!("last error: {err}\n"));
    }
    out
}

pub fn list(view: &SessionView) -> String {
    view.contacts
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let cursor = if view.current_index == Some(i) { ">" } else { " " };
            format!("{cursor}{} {:>3}. {}", status_mark(c.status), i + 1, contact_line(c))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn send_outcome(outcome: &SendOutcome) -> String {
    match outcome {
        SendOutcome::NothingPending => "nothing left to send".to_string(),
        SendOutcome::Busy => "a send is already in progress".to_string(),
        SendOutcome::Sent(c) => format!("sent: {}", contact_line(c)),
        SendOutcome::Failed { contact, failure } => {
            format!("failed: {} ({failure})", contact_line(contact))
        }
    }
}
