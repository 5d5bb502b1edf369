use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use ui_session::{
    ClientConfig, ClientHandle, RenderTarget, SessionClient, SessionState, StaticToken,
    WsConnector,
};

use super::outline::OutlineSink;

/// One line of user input.
#[derive(Debug, PartialEq)]
enum Input {
    Chat(String),
    New,
    Load(String),
    History,
    Saved,
    Save(usize),
    Delete(String),
    Combine(Vec<String>),
    Condense,
    Agents,
    Quit,
    Empty,
    Invalid(String),
}

fn parse_input(line: &str) -> Input {
    let line = line.trim();
    if line.is_empty() {
        return Input::Empty;
    }
    let Some(command) = line.strip_prefix('/') else {
        return Input::Chat(line.to_string());
    };

    let mut words = command.split_whitespace();
    let name = words.next().unwrap_or_default();
    let args: Vec<String> = words.map(String::from).collect();

    match (name, args.as_slice()) {
        ("new", []) => Input::New,
        ("load", [id]) => Input::Load(id.clone()),
        ("history", []) => Input::History,
        ("saved", []) => Input::Saved,
        ("save", [index]) => match index.parse() {
            Ok(index) => Input::Save(index),
            Err(_) => Input::Invalid(format!("not a message index: {index}")),
        },
        ("delete", [id]) => Input::Delete(id.clone()),
        ("combine", ids) if ids.len() >= 2 => Input::Combine(ids.to_vec()),
        ("condense", []) => Input::Condense,
        ("agents", []) => Input::Agents,
        ("quit" | "exit", []) => Input::Quit,
        _ => Input::Invalid(format!("unknown command: /{command}")),
    }
}

/// Connect and drive the session from stdin until `/quit`, EOF or Ctrl-C.
pub async fn run_command(
    config: ClientConfig,
    token: Option<String>,
    chat: Option<String>,
) -> Result<()> {
    if token.is_none() {
        anyhow::bail!("no token configured; pass --token or set UI_SESSION_AUTH__TOKEN");
    }
    info!(url = %config.url, "starting session");

    let handle = SessionClient::spawn(config, WsConnector, StaticToken(token), OutlineSink);
    handle.connect().await?;

    if let Some(chat_id) = chat {
        let handle = handle.clone();
        tokio::spawn(async move {
            let mut connected = handle.connected();
            if connected.wait_for(|c| *c).await.is_ok() {
                let _ = handle.load_chat(chat_id).await;
            }
        });
    }
    tokio::spawn(report_changes(handle.clone()));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("failed to read stdin")?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else { break };

        match parse_input(&line) {
            Input::Quit => break,
            Input::Empty => {}
            Input::Invalid(message) => eprintln!("{message}"),
            input => {
                if let Err(e) = execute(&handle, input).await {
                    warn!(error = %e, "command failed");
                }
            }
        }
    }

    handle.disconnect().await?;
    handle.shutdown().await?;
    Ok(())
}

async fn execute(handle: &ClientHandle, input: Input) -> Result<()> {
    match input {
        Input::Chat(text) => {
            if !handle.send_chat_message(text).await? {
                eprintln!("not connected; message not sent");
            }
        }
        Input::New => handle.new_chat().await?,
        Input::Load(id) => handle.load_chat(id).await?,
        Input::History => {
            for chat in handle.state().chats() {
                println!("{}  {}", chat.id, chat.title);
            }
            handle.request_history().await?;
        }
        Input::Saved => {
            let state = handle.state();
            for saved in state.saved_components() {
                println!("{}  [{}] {}", saved.id, saved.component_type, saved.title);
            }
            handle.request_saved_components(None).await?;
        }
        Input::Save(index) => {
            let forest = handle
                .state()
                .forest(RenderTarget::Message(index))
                .map(<[_]>::to_vec)
                .with_context(|| format!("message {index} has no components"))?;
            // Runs in the background so input stays responsive while each
            // save waits for its confirmation.
            let handle = handle.clone();
            tokio::spawn(async move {
                match handle.save_all(&forest).await {
                    Ok(saved) => println!("saved {} component(s)", saved.len()),
                    Err(e) => eprintln!("save failed: {e}"),
                }
            });
        }
        Input::Delete(id) => handle.delete_saved_component(id).await?,
        Input::Combine(ids) => handle.combine_components(ids).await?,
        Input::Condense => handle.condense_components().await?,
        Input::Agents => {
            for agent in handle.state().agents() {
                println!("{}  {}", agent.id, agent.name.as_deref().unwrap_or(""));
            }
            handle.discover_agents().await?;
        }
        Input::Quit | Input::Empty | Input::Invalid(_) => {}
    }
    Ok(())
}

/// Print connectivity, status and error changes as they happen.
async fn report_changes(handle: ClientHandle) {
    let mut states = handle.subscribe();
    let mut connected = handle.connected();
    let mut last = SessionState::new();

    loop {
        tokio::select! {
            changed = connected.changed() => {
                if changed.is_err() {
                    break;
                }
                let online = *connected.borrow_and_update();
                eprintln!("{}", if online { "* connected" } else { "* disconnected" });
            }
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = states.borrow_and_update().clone();
                if state.status() != last.status() {
                    let status = state.status();
                    let busy = if status.is_busy() { " (working)" } else { "" };
                    eprintln!("* status: {status:?}{busy}");
                }
                for (now, before) in [
                    (state.save_error(), last.save_error()),
                    (state.combine_error(), last.combine_error()),
                ] {
                    if let Some(error) = now.filter(|e| Some(*e) != before) {
                        eprintln!("* error: {error}");
                    }
                }
                if state.is_combining() && !last.is_combining() {
                    eprintln!("* combining...");
                }
                last = state;
            }
        }
    }
}
