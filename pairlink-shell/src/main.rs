//! Pairlink — collaborative code editing from the terminal.
//!
//! Creates or joins a room, keeps the shared buffer in sync over the room
//! channel and offers inline completions. Input is line-based; run `:help`
//! inside the session for the command list.

mod config;
mod input;
mod state;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::Instant;

use pairlink_assist::{CompletionConfig, HttpCompletionBackend, DEFAULT_LANGUAGE};
use pairlink_collab::{
    parse_room_id, ChannelClient, ChannelConfig, ProfileStore, RoomsClient, Session,
};

use config::ShellConfig;
use input::{parse_input, Input, HELP, SUPPORTED_LANGUAGES};
use state::EditorState;

#[derive(Parser)]
#[command(name = "pairlink", version, about = "Collaborative code editor")]
struct Cli {
    /// Language sent with completion requests
    #[arg(long, global = true, default_value = DEFAULT_LANGUAGE)]
    language: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a new room and join it
    Create {
        /// Display name shown to other peers
        #[arg(long)]
        name: Option<String>,
    },
    /// Join an existing room by id or share link
    Join {
        room: String,
        #[arg(long)]
        name: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let config = ShellConfig::from_env();

    if !SUPPORTED_LANGUAGES.contains(&cli.language.as_str()) {
        anyhow::bail!(
            "unsupported language {:?}; expected one of {}",
            cli.language,
            SUPPORTED_LANGUAGES.join(", ")
        );
    }

    let profile = ProfileStore::new(&config.profile_path);
    let (room_id, name) = match cli.command {
        Command::Create { name } => {
            let name = name.unwrap_or_else(|| profile.load_display_name());
            let rooms = RoomsClient::new(&config.api_base_url);
            let room_id = rooms
                .create_room()
                .await
                .context("Failed to create room. Please try again.")?;
            println!("Created room {room_id}  (share {})", RoomsClient::room_path(&room_id));
            (room_id, name)
        }
        Command::Join { room, name } => {
            let room_id = parse_room_id(&room).context("Please enter a room ID")?;
            (room_id, name.unwrap_or_else(|| profile.load_display_name()))
        }
    };
    profile
        .save_display_name(&name)
        .context("Failed to save display name")?;

    let session = Session::new(room_id, &name);
    info!("Joining room {} as {}", session.room_id(), session.user_id());

    let channel_config = ChannelConfig::new(&config.ws_base_url);
    let mut client = ChannelClient::connect(session.clone(), channel_config)?;
    let mut events = client
        .take_event_rx()
        .context("channel event stream already taken")?;

    let completion = CompletionConfig {
        language: cli.language,
        ..CompletionConfig::default()
    };
    let backend = HttpCompletionBackend::new(&config.api_base_url);
    let mut editor = EditorState::new(session, client.handle(), backend, completion);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut channel_live = true;
    println!("{HELP}");

    loop {
        let cursor_deadline = editor.cursor_flush_deadline();
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match parse_input(&line) {
                    Input::Quit => break,
                    Input::Empty => {}
                    Input::Help => println!("{HELP}"),
                    Input::Show => print!("{}", editor.render()),
                    Input::Type(text) => editor.type_text(&text),
                    Input::Newline => editor.type_text("\n"),
                    Input::Key(key) => {
                        if editor.handle_key(key) {
                            print!("{}", editor.render());
                        }
                    }
                    Input::Goto(offset) => {
                        editor.move_caret(offset);
                        info!("Caret at {}", editor.caret());
                    }
                    Input::Click { x, y } => {
                        if editor.click(x, y) {
                            print!("{}", editor.render());
                        }
                    }
                    Input::Language(tag) => {
                        editor.set_language(&tag);
                        info!("Completion language set to {}", editor.completion().language());
                    }
                    Input::Unknown(line) => warn!("Unknown command: {line} (try :help)"),
                }
            }
            event = events.recv(), if channel_live => match event {
                Some(event) => {
                    if editor.apply_channel_event(event) {
                        print!("{}", editor.render());
                    }
                }
                None => {
                    channel_live = false;
                    warn!("Channel closed ({:?}); edits stay local", editor.connection());
                }
            },
            Some(event) = editor.next_completion_event() => {
                if editor.apply_completion_event(event) {
                    print!("{}", editor.render_popup());
                }
            }
            _ = sleep_until_some(cursor_deadline), if cursor_deadline.is_some() => {
                editor.flush_cursor();
            }
        }
    }

    editor.flush_cursor();
    client.disconnect();
    let state = client.closed().await;
    info!("Left room: {state:?} ({} chars)", editor.text().chars().count());
    Ok(())
}

async fn sleep_until_some(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
