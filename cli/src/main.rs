/*
    moodmix-rs | Mood-driven Spotify recommendations from the terminal.
    Copyright (C) 2025  The moodmix-rs contributors

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.

    This program is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU Affero General Public License for more details.

    You should have received a copy of the GNU Affero General Public License
    along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/

use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use log::debug;
use moodmix_core::library::DEFAULT_HISTORY_DAYS;
use moodmix_core::{
    ActivityEvent, ApiError, BlendClient, ClientConfig, InactivityMonitor, Library, LoadOutcome,
    MoodQuery, Navigator, RecommendationBuffer, Replacement, Route, SessionManager, SessionState,
    Social, TokenMode, PRESET_MOODS,
};
use std::fs::File;
use std::io::Write;
use std::process;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser)]
#[command(name = "moodmix")]
#[command(about = "Mood-driven Spotify recommendations from the terminal", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Shows who is logged in
    Status,
    /// Prints the Spotify login URL to open in a browser
    Login,
    /// Completes the login with the URL the browser landed on
    Callback {
        #[arg(value_name = "URL")]
        url: String,
    },
    /// Ends the session on the backend and locally
    Logout,
    /// Loads recommendations for a mood preset or a free-text description
    Recommend {
        /// One of the preset moods (happy, sad, chill, ...)
        #[arg(long, short = 'm', conflicts_with = "text", required_unless_present = "text")]
        mood: Option<String>,

        /// Describe how you feel; the backend infers the mood
        #[arg(long, short = 't')]
        text: Option<String>,

        /// Total tracks to fetch (displayed plus reserve)
        #[arg(long)]
        limit: Option<usize>,

        /// Track IDs to swap out before printing (repeatable)
        #[arg(long, value_name = "TRACK_ID")]
        dislike: Vec<String>,

        /// Save the displayed tracks as a new playlist with this name
        #[arg(long, value_name = "NAME")]
        save_as: Option<String>,

        /// Output the recommendation set to a JSON file (e.g., --json=mix.json)
        #[arg(long)]
        json: Option<String>,
    },
    /// Shows your mood history
    History {
        /// How many days back to look
        #[arg(long, default_value_t = DEFAULT_HISTORY_DAYS)]
        days: u32,
    },
    /// Shared blend rooms
    Blend {
        #[command(subcommand)]
        action: BlendAction,
    },
    /// Friends: activity feed, user search and following
    Social {
        #[command(subcommand)]
        action: SocialAction,
    },
    /// Interactive session: pick moods, swap tracks, save playlists
    Browse,
}

#[derive(Subcommand)]
enum SocialAction {
    /// Shows what the people you follow have been listening to
    Feed,
    /// Finds users by display name
    Search {
        #[arg(value_name = "NAME")]
        query: String,
    },
    /// Follows a user by ID
    Follow {
        #[arg(value_name = "USER_ID")]
        user_id: String,
    },
}

#[derive(Subcommand)]
enum BlendAction {
    /// Opens a new room and prints its code
    Create,
    /// Joins a room by code
    Join {
        #[arg(value_name = "CODE")]
        code: String,
    },
    /// Lists a room's participants
    Show {
        #[arg(value_name = "CODE")]
        code: String,
    },
    /// Mixes the room's taste for a mood
    Generate {
        #[arg(value_name = "CODE")]
        code: String,
        #[arg(long, short = 'm')]
        mood: String,
    },
    /// Leaves a room
    Leave {
        #[arg(value_name = "CODE")]
        code: String,
    },
}

/// Routes are rendered as instructions since there is no page to switch to.
struct ConsoleNavigator;

impl Navigator for ConsoleNavigator {
    fn navigate(&self, route: Route) {
        match route {
            Route::Login => {
                println!();
                println!("[SESSION] You are logged out. Run 'moodmix login' to sign in again.");
            }
            Route::Home => println!("[SESSION] Ready. Try 'moodmix recommend --mood happy'."),
            Route::External(url) => {
                println!("Open this URL in your browser to log in with Spotify:");
                println!();
                println!("   {}", url);
            }
        }
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();

    if dotenv().is_err() {
        // Silently ignore
    }

    let cli = Cli::parse();
    let (config, session) = build_session();

    match cli.command {
        Commands::Status => handle_status(&session).await,
        Commands::Login => handle_login(&config, &session),
        Commands::Callback { url } => handle_callback(&config, &session, &url).await,
        Commands::Logout => handle_logout(&session).await,
        Commands::Recommend {
            mood,
            text,
            limit,
            dislike,
            save_as,
            json,
        } => {
            let query = match (mood, text) {
                (Some(mood), _) => MoodQuery::Preset(mood.trim().to_lowercase()),
                (None, Some(text)) => MoodQuery::Text(text),
                (None, None) => {
                    eprintln!("Pass either --mood or --text.");
                    process::exit(1);
                }
            };
            handle_recommend(
                &config,
                &session,
                query,
                limit.unwrap_or(config.fetch_limit),
                &dislike,
                save_as.as_deref(),
                json.as_deref(),
            )
            .await;
        }
        Commands::History { days } => handle_history(&session, days).await,
        Commands::Blend { action } => handle_blend(&session, action).await,
        Commands::Social { action } => handle_social(&session, action).await,
        Commands::Browse => {
            if let Err(e) = run_browse(&config, session).await {
                eprintln!("[ERROR] {:#}", e);
                process::exit(1);
            }
        }
    }
}

fn build_session() -> (ClientConfig, Arc<SessionManager>) {
    let config = match ClientConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            process::exit(1);
        }
    };
    debug!("Using backend at {} ({:?} mode)", config.api_base_url, config.token_mode);

    match SessionManager::from_config(&config, Arc::new(ConsoleNavigator)) {
        Ok(session) => (config, Arc::new(session)),
        Err(e) => {
            eprintln!("Error initializing HTTP client: {}", e);
            process::exit(1);
        }
    }
}

async fn require_login(session: &SessionManager) {
    if !session.check_status().await.is_authenticated() {
        eprintln!("Not logged in. Run 'moodmix login' first.");
        process::exit(1);
    }
}

fn print_user(state: &SessionState) {
    match state.user() {
        Some(user) => {
            println!("Logged in as:  {}", user.label());
            println!("User ID:       {}", user.id);
            if let Some(email) = &user.email {
                println!("Email:         {}", email);
            }
        }
        None => println!("Not logged in."),
    }
}

fn write_json(path: &str, json_content: &str) {
    match File::create(path) {
        Ok(mut file) => {
            if let Err(e) = file.write_all(json_content.as_bytes()) {
                eprintln!();
                eprintln!("[ERROR] Failed to write report to file: {}", e);
            } else {
                println!();
                println!("[SAVED] Report saved to: {}", path);
            }
        }
        Err(e) => eprintln!("[ERROR] Failed to create file '{}': {}", path, e),
    }
}

async fn handle_status(session: &SessionManager) {
    let state = session.check_status().await;
    print_user(&state);
}

fn handle_login(config: &ClientConfig, session: &SessionManager) {
    session.login();
    println!();
    match config.token_mode {
        TokenMode::Storage => {
            println!("After approving, copy the address the browser lands on and run:");
            println!("   moodmix callback '<URL>'");
        }
        TokenMode::Cookie => {
            println!("Cookie mode: the session cookies live in this program's memory only.");
            println!("Start 'moodmix browse', type 'login', and paste the backend");
            println!("'/auth/callback?code=...' address with 'callback <URL>' before the");
            println!("browser opens it (the code works once).");
            println!("Set MOODMIX_TOKEN_MODE=storage to keep tokens between commands.");
        }
    }
}

async fn handle_callback(config: &ClientConfig, session: &SessionManager, url: &str) {
    if config.token_mode == TokenMode::Cookie {
        println!("Note: in cookie mode this session ends when the command exits.");
    }
    match session.complete_callback(url).await {
        Ok(state) => print_user(&state),
        Err(e) => {
            eprintln!("[ERROR] Login failed: {}", e);
            process::exit(1);
        }
    }
}

async fn handle_logout(session: &SessionManager) {
    session.logout().await;
    println!("[OK] Logged out.");
}

fn print_set(buffer: &RecommendationBuffer) {
    let snapshot = buffer.snapshot();
    let Some(set) = snapshot.set else {
        if let Some(error) = snapshot.error {
            println!("[ERROR] {}", error);
        } else {
            println!("No recommendations loaded.");
        }
        return;
    };

    let context = set.context();
    println!();
    println!("---------------------------------------------------");
    println!("MOOD: {}", context.mood.to_uppercase());
    if let Some(text) = &context.query_text {
        println!("From: \"{}\"", text);
    }
    println!("{}", context.description);
    println!("---------------------------------------------------");
    for (i, track) in set.displayed().iter().enumerate() {
        println!("{:>3}. {}", i + 1, track);
    }
    println!("---------------------------------------------------");
    println!(
        "Showing {} tracks, {} more in reserve.",
        set.displayed().len(),
        set.reserve_len()
    );
}

fn report_replacement(track_id: &str, outcome: &Replacement) {
    match outcome {
        Replacement::Swapped { index, removed } => {
            println!("[SWAPPED] #{} {} replaced", index + 1, removed.name)
        }
        Replacement::Removed { index, removed } => {
            println!("[REMOVED] #{} {} (no more tracks in reserve)", index + 1, removed.name)
        }
        Replacement::NotFound => println!("[SKIP] Track {} is not in the list", track_id),
    }
}

async fn handle_recommend(
    config: &ClientConfig,
    session: &SessionManager,
    query: MoodQuery,
    limit: usize,
    dislikes: &[String],
    save_as: Option<&str>,
    json_path: Option<&str>,
) {
    require_login(session).await;
    let buffer = RecommendationBuffer::with_capacity(session.client().clone(), config.display_capacity);

    println!("Fetching recommendations...");
    if let Err(e) = buffer.load_for_mood(query, limit).await {
        eprintln!();
        eprintln!("[ERROR] {}", buffer.error().unwrap_or_else(|| e.to_string()));
        process::exit(1);
    }

    for track_id in dislikes {
        let outcome = buffer.dislike(track_id);
        report_replacement(track_id, &outcome);
    }

    print_set(&buffer);

    if let Some(name) = save_as {
        save_playlist(&buffer, name).await;
    }

    if let Some(path) = json_path {
        if let Some(set) = buffer.snapshot().set {
            write_json(path, &serde_json::to_string_pretty(&set).unwrap_or_default());
        }
    }

    if !dislikes.is_empty() {
        // Give the background feedback calls a moment before the runtime shuts down.
        tokio::time::sleep(std::time::Duration::from_millis(500)).await;
    }
}

async fn save_playlist(buffer: &RecommendationBuffer, name: &str) {
    match buffer.save_playlist(name, "Created with moodmix", false).await {
        Ok(created) => {
            println!();
            println!(
                "[SAVED] Playlist '{}' with {} tracks",
                created.name, created.tracks_added
            );
            if let Some(url) = created.external_urls.spotify {
                println!("   {}", url);
            }
        }
        Err(e) => eprintln!("[ERROR] Could not save playlist: {}", e),
    }
}

async fn handle_history(session: &SessionManager, days: u32) {
    require_login(session).await;

    match Library::new(session.client().clone()).mood_timeline(days).await {
        Ok(timeline) => {
            println!();
            println!("---------------------------------------------------");
            println!("MOOD HISTORY (last {} days)", days);
            println!("---------------------------------------------------");
            if let Some(mood) = timeline.dominant_mood() {
                println!("Most frequent:  {}", mood);
            }
            for (mood, count) in &timeline.mood_distribution {
                println!("   {:<12} {}", mood, count);
            }
            println!("---------------------------------------------------");
            if timeline.recent_entries.is_empty() {
                println!("No entries yet.");
            }
            for entry in &timeline.recent_entries {
                println!("{}  {}", entry.timestamp, entry.mood);
                for track in entry.tracks.iter().take(3) {
                    println!("      {} - {}", track.name, track.artists.join(", "));
                }
            }
        }
        Err(e) => {
            eprintln!("[ERROR] Failed to load history: {}", e);
            process::exit(1);
        }
    }
}

async fn handle_blend(session: &SessionManager, action: BlendAction) {
    require_login(session).await;
    let blend = BlendClient::new(session.client().clone());

    let result: Result<(), ApiError> = async move {
        match action {
            BlendAction::Create => {
                let created = blend.create().await?;
                println!("[BLEND] Room created. Share this code: {}", created.session_id);
            }
            BlendAction::Join { code } => {
                let code = blend.join(&code).await?;
                println!("[BLEND] Joined room {}", code);
            }
            BlendAction::Show { code } => {
                let room = blend.room(&code).await?;
                println!();
                println!("ROOM {} ({})", room.id, if room.is_active { "active" } else { "closed" });
                println!("---------------------------------------------------");
                for p in &room.participants {
                    let host = if p.is_host { " [host]" } else { "" };
                    println!(
                        "   {}{}",
                        p.display_name.as_deref().unwrap_or(&p.id),
                        host
                    );
                }
            }
            BlendAction::Generate { code, mood } => {
                println!("Mixing room {} for '{}'...", code, mood);
                blend.generate(&code, &mood).await?;
                print_set(blend.buffer());
            }
            BlendAction::Leave { code } => {
                blend.leave(&code).await?;
                println!("[BLEND] Left room {}", code);
            }
        }
        Ok(())
    }
    .await;

    if let Err(e) = result {
        eprintln!("[ERROR] Blend failed: {}", e);
        process::exit(1);
    }
}

async fn handle_social(session: &SessionManager, action: SocialAction) {
    require_login(session).await;
    let social = Social::new(session.client().clone());

    let result: Result<(), ApiError> = async move {
        match action {
            SocialAction::Feed => {
                let feed = social.feed().await?;
                println!();
                println!("FRIENDS' ACTIVITY");
                println!("---------------------------------------------------");
                if feed.is_empty() {
                    println!("No activity yet. Follow some friends!");
                }
                for entry in &feed {
                    let who = entry.user.as_ref().map(|u| u.label()).unwrap_or("Someone");
                    println!(
                        "{}  {} felt {} ({} tracks)",
                        entry.timestamp,
                        who,
                        entry.mood,
                        entry.tracks.len()
                    );
                }
            }
            SocialAction::Search { query } => {
                let users = social.search_users(&query).await?;
                if users.is_empty() {
                    println!("No users match '{}'.", query.trim());
                }
                for user in &users {
                    println!("{:<30} | {}", user.id, user.label());
                }
            }
            SocialAction::Follow { user_id } => {
                let message = social.follow(&user_id).await?;
                println!("[OK] {}", message);
            }
        }
        Ok(())
    }
    .await;

    if let Err(e) = result {
        eprintln!("[ERROR] Social request failed: {}", e);
        process::exit(1);
    }
}

fn print_browse_help() {
    println!("Commands:");
    println!("   mood <name>        load a preset ({})", PRESET_MOODS.join(", "));
    println!("   feel <text>        describe your mood in words");
    println!("   list               show the current tracks");
    println!("   dislike <id>       swap a track out and tell the recommender");
    println!("   like <id>          tell the recommender you like a track");
    println!("   save <name>        save the list as a playlist");
    println!("   login | callback <url> | status | logout");
    println!("   help | quit");
}

async fn run_browse(config: &ClientConfig, session: Arc<SessionManager>) -> anyhow::Result<()> {
    let buffer = RecommendationBuffer::with_capacity(session.client().clone(), config.display_capacity);
    let monitor = InactivityMonitor::with_timing(
        session.clone(),
        config.inactivity_timeout,
        config.activity_throttle,
    );
    let keyboard = monitor.register_source();
    let mut state_rx = session.subscribe();

    print_user(&session.check_status().await);
    print_browse_help();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("moodmix> ");
        std::io::stdout().flush().context("stdout closed")?;

        let line = tokio::select! {
            line = lines.next_line() => line.context("failed to read input")?,
            changed = state_rx.changed() => {
                if changed.is_ok() && !state_rx.borrow_and_update().is_authenticated() {
                    buffer.clear();
                    println!();
                    println!("[SESSION] Signed out. Type 'login' to start again.");
                }
                continue;
            }
        };
        let Some(line) = line else { break };
        keyboard.record(ActivityEvent::KeyDown);

        let line = line.trim();
        let (command, arg) = match line.split_once(' ') {
            Some((c, a)) => (c, a.trim()),
            None => (line, ""),
        };

        match command {
            "" => {}
            "help" => print_browse_help(),
            "quit" | "exit" => break,
            "status" => print_user(&session.check_status().await),
            "login" => {
                session.login();
            }
            "callback" => match session.complete_callback(arg).await {
                Ok(state) => print_user(&state),
                Err(e) => println!("[ERROR] {}", e),
            },
            "logout" => {
                session.logout().await;
                buffer.clear();
                println!("[OK] Logged out.");
            }
            "mood" | "feel" => {
                if !session.state().is_authenticated() {
                    println!("Log in first ('login').");
                    continue;
                }
                let query = if command == "mood" {
                    MoodQuery::Preset(arg.to_lowercase())
                } else {
                    MoodQuery::Text(arg.to_string())
                };
                match buffer.load_for_mood(query, config.fetch_limit).await {
                    Ok(LoadOutcome::Applied { .. }) => print_set(&buffer),
                    Ok(LoadOutcome::Superseded) => {}
                    Err(ApiError::Validation(msg)) => println!("[ERROR] {}", msg),
                    Err(e) => match buffer.error() {
                        Some(msg) => println!("[ERROR] {}", msg),
                        None => debug!("Load ended without inline error: {}", e),
                    },
                }
            }
            "list" => print_set(&buffer),
            "dislike" => {
                let outcome = buffer.dislike(arg);
                report_replacement(arg, &outcome);
            }
            "like" => {
                if buffer.like(arg).await {
                    println!("[OK] Noted.");
                } else {
                    println!("[SKIP] Track {} is not in the list", arg);
                }
            }
            "save" => {
                if arg.is_empty() {
                    println!("Usage: save <name>");
                } else {
                    save_playlist(&buffer, arg).await;
                }
            }
            other => println!("Unknown command '{}'. Type 'help'.", other),
        }
    }

    drop(monitor);
    Ok(())
}
