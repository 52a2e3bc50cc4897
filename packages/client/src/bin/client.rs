//! Interactive CLI chat client for Hiroba.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin hiroba-client -- --room team-42 --name alice
//! ```

use clap::Parser;
use hiroba_client::{
    ClientConfig, ConnectionState, SessionController, SessionHandle, ViewEvent,
    WebSocketConnector,
};
use hiroba_shared::{logger::setup_logger, time::timestamp_to_clock};
use rustyline::{DefaultEditor, error::ReadlineError};
use tokio::sync::mpsc;

const HELP: &str = "\
/join <room>               switch rooms
/leave                     leave the current room
/status <status>           broadcast a status
/mention <user> <message>  mention a user
/auth <user-id> <name>     authenticate
/read <notification-id>    mark a notification read
/quit                      leave and exit";

enum Input {
    Line(String),
    Quit,
}

#[tokio::main]
async fn main() {
    let config = ClientConfig::parse();

    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "warn");

    let connector = match WebSocketConnector::new(config.url.clone()) {
        Ok(connector) => connector,
        Err(e) => {
            tracing::error!("Client error: {}", e);
            std::process::exit(1);
        }
    };
    let (handle, mut events) = SessionController::new(config, connector).start();
    let mut input = spawn_reader();

    loop {
        tokio::select! {
            line = input.recv() => match line {
                Some(Input::Line(line)) => {
                    if !run_line(&handle, line.trim()) {
                        break;
                    }
                }
                Some(Input::Quit) | None => break,
            },
            event = events.recv() => match event {
                Some(event) => {
                    let given_up = event == ViewEvent::State(ConnectionState::GivenUp);
                    print_event(event);
                    if given_up {
                        break;
                    }
                }
                None => break,
            },
        }
    }

    handle.shutdown().await;
}

/// Read lines on a blocking thread; rustyline owns the terminal.
fn spawn_reader() -> mpsc::UnboundedReceiver<Input> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::task::spawn_blocking(move || {
        let mut editor = match DefaultEditor::new() {
            Ok(editor) => editor,
            Err(e) => {
                tracing::error!("Failed to open the terminal: {}", e);
                let _ = tx.send(Input::Quit);
                return;
            }
        };
        loop {
            match editor.readline("> ") {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        let _ = editor.add_history_entry(line.as_str());
                    }
                    if tx.send(Input::Line(line)).is_err() {
                        return;
                    }
                }
                Err(ReadlineError::Interrupted | ReadlineError::Eof) => {
                    let _ = tx.send(Input::Quit);
                    return;
                }
                Err(e) => {
                    tracing::error!("Readline error: {}", e);
                    let _ = tx.send(Input::Quit);
                    return;
                }
            }
        }
    });
    rx
}

/// Returns false when the user asked to quit.
fn run_line(handle: &SessionHandle, line: &str) -> bool {
    let Some(command) = line.strip_prefix('/') else {
        handle.send(line);
        return true;
    };
    let (name, rest) = command.split_once(' ').unwrap_or((command, ""));
    let rest = rest.trim();
    match name {
        "quit" | "exit" => return false,
        "join" if !rest.is_empty() => handle.join(rest),
        "leave" => handle.leave(),
        "status" if !rest.is_empty() => handle.set_status(rest),
        "mention" => match rest.split_once(' ') {
            Some((target, message)) => handle.mention(target, message.trim()),
            None => println!("usage: /mention <user> <message>"),
        },
        "auth" => match rest.split_once(' ') {
            Some((user_id, user_name)) => handle.authenticate(user_id, user_name.trim()),
            None => println!("usage: /auth <user-id> <name>"),
        },
        "read" if !rest.is_empty() => handle.mark_read(rest),
        _ => println!("{HELP}"),
    }
    true
}

fn print_event(event: ViewEvent) {
    match event {
        ViewEvent::State(state) => match state {
            ConnectionState::Connected => println!("* connected"),
            ConnectionState::Disconnected => println!("* disconnected"),
            ConnectionState::Reconnecting { attempt } => {
                println!("* reconnecting (attempt {attempt})")
            }
            ConnectionState::GivenUp => println!("* could not reconnect; giving up"),
            ConnectionState::Connecting => {}
        },
        ViewEvent::Identity { user_name, .. } => println!("* you are {user_name}"),
        ViewEvent::Authenticated { user_name, .. } => println!("* authenticated as {user_name}"),
        ViewEvent::Message(line) => {
            let marker = if line.own { "*" } else { " " };
            println!(
                "[{}]{marker}{}: {}",
                timestamp_to_clock(line.timestamp),
                line.user_name,
                line.content
            );
        }
        ViewEvent::Roster {
            room_id,
            member_count,
        } => println!("* {room_id}: {member_count} member(s)"),
        ViewEvent::MemberLeft { user_name, .. } => println!("* {user_name} left"),
        ViewEvent::Typing(names) => {
            if !names.is_empty() {
                println!("* {} typing...", names.join(", "));
            }
        }
        ViewEvent::Mention(mention) => {
            println!("@ {} mentioned you: {}", mention.from_user_name, mention.message)
        }
        ViewEvent::Notification(notification) => println!(
            "! [{}] {}: {} ({})",
            notification.kind, notification.title, notification.body, notification.id
        ),
        ViewEvent::NotificationRead(id) => println!("* notification {id} read"),
        ViewEvent::Presence(presence) => {
            println!("* {} is {}", presence.name, presence.status)
        }
        ViewEvent::Activity(activity) => {
            println!("* {} {}", activity.user_name, activity.activity)
        }
        ViewEvent::Preferences(preferences) => {
            println!("* preferences: {}", serde_json::Value::Object(preferences))
        }
    }
}
