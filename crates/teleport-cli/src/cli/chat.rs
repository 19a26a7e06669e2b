use anyhow::Result;
use chrono::{Local, TimeZone};
use teleport_core::{ChatEvent, CoreError, CoreRuntime, SyncUpdate};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

/// One line of user input in the chat loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatInput {
    Message(String),
    Nick(String),
    Join(String),
    Quit,
    Empty,
}

pub fn parse_input(line: &str) -> ChatInput {
    let line = line.trim();
    if line.is_empty() {
        return ChatInput::Empty;
    }
    let Some(command) = line.strip_prefix('/') else {
        return ChatInput::Message(line.to_string());
    };
    let (name, arg) = command.split_once(' ').unwrap_or((command, ""));
    match name {
        "nick" => ChatInput::Nick(arg.trim().to_string()),
        "join" => ChatInput::Join(arg.trim().to_string()),
        "quit" | "exit" => ChatInput::Quit,
        _ => ChatInput::Message(line.to_string()),
    }
}

/// `[HH:MM:SS] nick (abcd1234): content`, without the nickname when unset.
pub fn format_event(event: &ChatEvent) -> String {
    let time = Local
        .timestamp_opt(event.created_at as i64, 0)
        .single()
        .map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "--:--:--".to_string());
    let short_key: String = event.pubkey.chars().take(8).collect();
    match event.nickname() {
        Some(nick) => format!("[{}] {} ({}): {}", time, nick, short_key, event.content),
        None => format!("[{}] {}: {}", time, short_key, event.content),
    }
}

/// Interactive loop: print sync updates, send stdin lines to the active channel.
pub async fn run_chat(runtime: &CoreRuntime, channel: &str) -> Result<()> {
    let mut updates = runtime.updates();
    join(runtime, channel).await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Ok(update) => print_update(&update),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("chat: display lagged, {} update(s) skipped", skipped);
                }
                Err(RecvError::Closed) => break,
            },
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match parse_input(&line) {
                    ChatInput::Empty => {}
                    ChatInput::Quit => break,
                    ChatInput::Nick(nick) => {
                        runtime.set_nickname(&nick);
                        println!("* nickname set to {:?}", nick);
                    }
                    ChatInput::Join(target) => join(runtime, &target).await,
                    ChatInput::Message(text) => match runtime.send(&text).await {
                        Ok(outcome) => {
                            tracing::debug!("chat: {} accepted by {}", outcome.event_id, outcome.accepted_by);
                        }
                        Err(e) => println!("! {}", e),
                    },
                }
            }
        }
    }

    runtime.shutdown().await;
    Ok(())
}

async fn join(runtime: &CoreRuntime, channel: &str) {
    match runtime.select_channel(channel).await {
        Ok(channel) => println!("* joined {}", channel.location_cue()),
        Err(CoreError::InvalidChannel(_)) => println!("! not a channel name: {:?}", channel),
        // Subscribe failed; the cached history is still shown
        Err(e) => println!("! {} (showing cached messages)", e),
    }
}

fn print_update(update: &SyncUpdate) {
    match update {
        SyncUpdate::Reset { channel, events } => {
            println!("--- {} ({} cached) ---", channel.location_cue(), events.len());
            for event in events {
                println!("{}", format_event(event));
            }
        }
        SyncUpdate::Appended { event, .. } => println!("{}", format_event(event)),
        SyncUpdate::CaughtUp { channel } => println!("--- {} up to date ---", channel.location_cue()),
        SyncUpdate::Closed => {}
    }
}
