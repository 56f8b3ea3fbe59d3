mod api;
mod app;
mod config;
mod favorites;
mod format;
mod router;
mod task;
mod ui;
mod worker;

use api::ApiClient;
use app::{App, InputMode};
use clap::{Parser, Subcommand};
use config::Config;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use favorites::Favorites;
use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use router::{Panel, Route};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{error, info};
use ui::ConfirmInput;
use worker::{Msg, Worker};

/// Terminal companion for the Find My friends screenshot backend
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Backend base URL
    #[arg(short, long, env = "FINDMY_URL", global = true)]
    url: Option<String>,

    /// Path to a JSON config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Start at a location, e.g. /friends/Anna or /screenshots
    #[arg(long)]
    open: Option<String>,

    /// Log level when RUST_LOG is not set
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the terminal UI (default)
    Run,
    /// Print the friends list, favorites first
    Friends,
    /// Print all screenshots, newest first
    Screenshots,
    /// Sync the friends list from Find My and wait for it to finish
    Sync,
    /// Download a screenshot
    Download {
        /// Screenshot filename as listed by `screenshots`
        filename: String,
        /// Output file (defaults to the download directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(url) = cli.url {
        config.base_url = url;
    }
    let api = ApiClient::new(&config.base_url)?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            init_logger(&cli.log_level, Some(&config.log_path()))?;
            let initial = cli
                .open
                .as_deref()
                .map(Route::from_path)
                .unwrap_or(Route::FriendsList);
            run_tui(&config, api, initial).await?;
        }
        Commands::Friends => {
            init_logger(&cli.log_level, None)?;
            print_friends(&api, &config).await?;
        }
        Commands::Screenshots => {
            init_logger(&cli.log_level, None)?;
            print_screenshots(&api).await?;
        }
        Commands::Sync => {
            init_logger(&cli.log_level, None)?;
            sync_and_wait(&api, &config).await?;
        }
        Commands::Download { filename, output } => {
            init_logger(&cli.log_level, None)?;
            let output = output.unwrap_or_else(|| config.download_dir().join(&filename));
            download_screenshot(&api, &filename, &output).await?;
        }
    }

    Ok(())
}

/// Log to `log_file` when given (the terminal UI owns stdout), else to stderr.
/// RUST_LOG takes precedence over `log_level`.
fn init_logger(log_level: &str, log_file: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::prelude::*;

    let filter_layer =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    let registry = tracing_subscriber::registry().with(filter_layer);

    match log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            let file_layer = tracing_subscriber::fmt::layer()
                .with_writer(std::sync::Mutex::new(file))
                .with_target(false)
                .with_ansi(false);
            registry.with(file_layer).init();
        }
        None => {
            let stderr_layer = tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false);
            registry.with(stderr_layer).init();
        }
    }
    Ok(())
}

async fn run_tui(config: &Config, api: ApiClient, initial: Route) -> Result<(), Box<dyn std::error::Error>> {
    let favorites = Favorites::load(&config.favorites_path());
    let (worker, mut rx) = Worker::new(Arc::new(api.clone()), config.timeouts());

    let mut app = App::new(favorites, config.download_dir()).with_backend(api.clone());
    info!(
        base_url = api.base_url(),
        location = %initial.to_path(),
        favorites = app.favorites.names().len(),
        "starting"
    );
    app.start(initial);

    // Init terminal
    let mut terminal = ratatui::init();

    // Main loop
    let result = run_app(&mut terminal, &mut app, &worker, &mut rx).await;

    // Restore terminal
    ratatui::restore();

    if let Err(e) = result {
        error!("terminal loop failed: {e}");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run_app(
    terminal: &mut ratatui::DefaultTerminal,
    app: &mut App,
    worker: &Worker,
    rx: &mut UnboundedReceiver<Msg>,
) -> Result<(), Box<dyn std::error::Error>> {
    loop {
        for command in app.take_commands() {
            worker.dispatch(command);
        }

        terminal.draw(|frame| ui::render(app, frame))?;

        if app.should_quit {
            return Ok(());
        }

        // Poll for events with a 250ms timeout
        if event::poll(Duration::from_millis(250))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    handle_key(app, key);
                }
            }
        }

        while let Ok(msg) = rx.try_recv() {
            app.handle(msg);
        }
        app.tick(Instant::now());
    }
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Ctrl+C always quits
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    if app.confirm.is_some() {
        match ui::read_confirm_key(key) {
            Some(ConfirmInput::Yes) => app.confirm_yes(),
            Some(ConfirmInput::No) => app.confirm_no(),
            None => {}
        }
        return;
    }

    if app.input_mode == InputMode::Editing {
        handle_filter_input(app, key);
        return;
    }

    // Help toggle (global)
    if key.code == KeyCode::Char('?') {
        app.show_help = !app.show_help;
        return;
    }

    // If help is showing, any key closes it
    if app.show_help {
        app.show_help = false;
        return;
    }

    let panel = app.panel();
    let in_list = matches!(panel, Panel::Friends | Panel::Screenshots);
    match key.code {
        KeyCode::Char('q') if in_list => app.should_quit = true,
        KeyCode::Char('q') => app.back(),
        KeyCode::Esc if panel == Panel::Friends && !app.filter.is_empty() => app.clear_filter(),
        KeyCode::Esc | KeyCode::Backspace => app.back(),
        KeyCode::Char(']') => app.forward(),
        KeyCode::Char('F') => app.show_friends(),
        KeyCode::Char('S') => app.show_screenshots(),
        KeyCode::Char('r') => app.reload(),
        _ => match panel {
            Panel::Friends => handle_friends_key(app, key),
            Panel::FriendDetail => handle_friend_detail_key(app, key),
            Panel::Screenshots => handle_screenshots_key(app, key),
            Panel::ScreenshotDetail => handle_screenshot_detail_key(app, key),
        },
    }
}

fn handle_filter_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Enter => app.input_mode = InputMode::Normal,
        KeyCode::Esc => {
            app.clear_filter();
            app.input_mode = InputMode::Normal;
        }
        KeyCode::Backspace => app.pop_filter(),
        KeyCode::Char(c) => app.push_filter(c),
        _ => {}
    }
}

/// Cursor movement shared by both lists. Returns whether the key was used.
fn handle_list_nav(app: &mut App, key: KeyEvent) -> bool {
    match key.code {
        KeyCode::Down | KeyCode::Char('j') => app.select_next(),
        KeyCode::Up | KeyCode::Char('k') => app.select_prev(),
        KeyCode::Home | KeyCode::Char('g') => app.select_first(),
        KeyCode::End | KeyCode::Char('G') => app.select_last(),
        KeyCode::Enter => app.open_selected(),
        _ => return false,
    }
    true
}

fn handle_friends_key(app: &mut App, key: KeyEvent) {
    if handle_list_nav(app, key) {
        return;
    }
    match key.code {
        KeyCode::Char('/') => app.input_mode = InputMode::Editing,
        KeyCode::Char('f') => app.toggle_favorite_here(),
        KeyCode::Char('s') => {
            app.sync();
        }
        _ => {}
    }
}

fn handle_friend_detail_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('f') => app.toggle_favorite_here(),
        KeyCode::Char('e') => {
            app.select_current_friend();
        }
        KeyCode::Char('p') => {
            app.take_screenshot();
        }
        KeyCode::Char('v') => app.view_last_screenshot(),
        KeyCode::Char('o') => app.open_external(),
        _ => {}
    }
}

fn handle_screenshots_key(app: &mut App, key: KeyEvent) {
    if handle_list_nav(app, key) {
        return;
    }
    match key.code {
        KeyCode::Char('a') => {
            app.screenshot_all();
        }
        KeyCode::Char('D') => app.request_delete_all(),
        _ => {}
    }
}

fn handle_screenshot_detail_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('d') => app.request_delete_current(),
        KeyCode::Char('o') => app.open_external(),
        KeyCode::Char('w') => {
            app.save_current_screenshot();
        }
        _ => {}
    }
}

async fn print_friends(api: &ApiClient, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let mut app = App::new(Favorites::load(&config.favorites_path()), config.download_dir());
    app.handle(Msg::FriendsLoaded(Ok(api.friends_list().await?)));

    let now = format::unix_now();
    println!("Last sync: {}", format::time_ago(app.last_sync, now));
    let rows = app.visible_friends();
    if rows.is_empty() {
        println!("No friends found. Try syncing first.");
    }
    for row in rows {
        println!(
            "{}{} {:<32} Last screenshot: {}",
            if row.favorite { "★" } else { " " },
            if row.selected { "✓" } else { " " },
            row.friend.name,
            format::time_ago(row.friend.last_screenshot_time, now)
        );
    }
    Ok(())
}

async fn print_screenshots(api: &ApiClient) -> Result<(), Box<dyn std::error::Error>> {
    let mut app = App::new(Favorites::in_memory(Vec::new()), PathBuf::from("."));
    app.handle(Msg::ScreenshotsLoaded(Ok(api.list_screenshots().await?)));

    let shots = app.sorted_screenshots();
    if shots.is_empty() {
        println!("No screenshots found.");
    }
    for shot in shots {
        println!("{:<48} Created: {}", shot.filename, format::format_time(Some(shot.modified)));
    }
    Ok(())
}

async fn sync_and_wait(api: &ApiClient, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let timeouts = config.timeouts();
    let started = api.sync().await?;

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    pb.set_message("Syncing friends list... This may take a while.");
    pb.enable_steady_tick(Duration::from_millis(100));

    match task::wait_for_task(api, &started.task_id, timeouts.sync, timeouts.poll_interval).await {
        Ok(_) => {
            pb.finish_with_message("Sync completed!");
            Ok(())
        }
        Err(e) => {
            pb.abandon_with_message(format!("Sync failed: {e}"));
            Err(e.into())
        }
    }
}

async fn download_screenshot(api: &ApiClient, filename: &str, output: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let response = api.get_screenshot(filename).await?;

    let pb = match response.content_length() {
        Some(total_size) => {
            let pb = ProgressBar::new(total_size);
            pb.set_style(ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({eta})")?
                .progress_chars("#>-"));
            pb
        }
        None => ProgressBar::new_spinner(),
    };

    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::File::create(output)?;
    let mut stream = response.bytes_stream();

    while let Some(item) = stream.next().await {
        let chunk = item?;
        file.write_all(&chunk)?;
        pb.inc(chunk.len() as u64);
    }

    pb.finish_with_message("Download complete");
    info!(path = %output.display(), "downloaded {filename}");
    eprintln!("Saved {}", output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Friend, FriendsList, Screenshot};
    use crate::app::Confirm;
    use crate::worker::Command;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn press(app: &mut App, keys: &str) {
        for c in keys.chars() {
            handle_key(app, key(KeyCode::Char(c)));
        }
    }

    fn app() -> App {
        let mut app = App::new(Favorites::in_memory(Vec::new()), PathBuf::from("/tmp"));
        app.start(Route::FriendsList);
        app.handle(Msg::FriendsLoaded(Ok(FriendsList {
            friends: ["anna", "bob"]
                .into_iter()
                .map(|name| Friend {
                    name: name.to_string(),
                    last_screenshot: None,
                    last_screenshot_time: None,
                })
                .collect(),
            last_sync: None,
            selected_friend: None,
        })));
        app.handle(Msg::ScreenshotsLoaded(Ok(vec![Screenshot {
            filename: "a.png".into(),
            modified: 1.0,
        }])));
        app.take_commands();
        app
    }

    #[test]
    fn test_q_quits_from_lists_and_goes_back_from_details() {
        let mut app = app();
        press(&mut app, "j");
        handle_key(&mut app, key(KeyCode::Enter));
        assert_eq!(app.route(), &Route::FriendDetail("bob".into()));
        press(&mut app, "q");
        assert_eq!(app.route(), &Route::FriendsList);
        assert!(!app.should_quit);
        press(&mut app, "]");
        assert_eq!(app.panel(), Panel::FriendDetail);
        press(&mut app, "Fq");
        assert!(app.should_quit);
    }

    #[test]
    fn test_ctrl_c_quits_even_while_filtering() {
        let mut app = app();
        press(&mut app, "/an");
        assert_eq!(app.filter, "an");
        handle_key(&mut app, KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert!(app.should_quit);
    }

    #[test]
    fn test_filter_mode_captures_keys() {
        let mut app = app();
        press(&mut app, "/q?s");
        assert_eq!(app.filter, "q?s");
        assert!(!app.should_quit && !app.show_help);
        handle_key(&mut app, key(KeyCode::Enter));
        assert_eq!(app.input_mode, InputMode::Normal);
        handle_key(&mut app, key(KeyCode::Esc));
        assert!(app.filter.is_empty());
    }

    #[test]
    fn test_help_swallows_next_key() {
        let mut app = app();
        press(&mut app, "?");
        assert!(app.show_help);
        press(&mut app, "s");
        assert!(!app.show_help);
        assert!(app.take_commands().is_empty());
    }

    #[test]
    fn test_delete_all_prompt_flow() {
        let mut app = app();
        press(&mut app, "S");
        app.take_commands();
        press(&mut app, "D");
        assert_eq!(app.confirm, Some(Confirm::DeleteAll));
        press(&mut app, "x");
        assert!(app.confirm.is_some());
        press(&mut app, "n");
        assert!(app.confirm.is_none());
        press(&mut app, "Dy");
        assert_eq!(app.take_commands(), vec![Command::DeleteAllScreenshots]);
    }

    #[test]
    fn test_friend_detail_keys() {
        let mut app = app();
        handle_key(&mut app, key(KeyCode::Enter));
        press(&mut app, "p");
        assert!(app.take_commands().is_empty());
        press(&mut app, "ef");
        assert_eq!(
            app.take_commands(),
            vec![Command::SelectFriend { name: "anna".into() }]
        );
        assert!(app.favorites.is_favorite("anna"));
    }
}
