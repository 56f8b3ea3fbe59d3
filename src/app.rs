use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use wildmatch::WildMatch;

use crate::api::{ApiClient, Friend, FriendsList, Screenshot};
use crate::favorites::Favorites;
use crate::format;
use crate::router::{self, History, Panel, Route};
use crate::worker::{Action, Command, Msg, Outcome};

/// How long a success message stays on screen.
pub const STATUS_TTL: Duration = Duration::from_secs(3);
pub const SCREENSHOT_ALL_STATUS_TTL: Duration = Duration::from_secs(5);
pub const FRIENDS_LOAD_ERROR: &str = "Error loading friends";

/// Input mode for the filter bar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Loading,
    Success,
    Error,
}

/// Inline status line of one panel.
#[derive(Debug, Clone)]
pub struct Status {
    pub kind: StatusKind,
    pub text: String,
    expires_at: Option<Instant>,
}

/// Load state of a cached list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Load {
    Idle,
    Loading,
    Loaded,
    Failed(String),
}

/// Pending destructive operation awaiting a yes/no.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Confirm {
    DeleteScreenshot(String),
    DeleteAll,
}

impl Confirm {
    pub fn prompt(&self) -> String {
        match self {
            Self::DeleteScreenshot(file) => format!("Are you sure you want to delete \"{file}\"?"),
            Self::DeleteAll => {
                "Are you sure you want to delete ALL screenshots? This cannot be undone!".to_string()
            }
        }
    }
}

/// One row of the friends list.
#[derive(Debug, Clone, PartialEq)]
pub struct FriendRow<'a> {
    pub friend: &'a Friend,
    pub favorite: bool,
    pub selected: bool,
}

/// Panel whose status line reports an action.
pub fn action_panel(action: Action) -> Panel {
    match action {
        Action::Sync => Panel::Friends,
        Action::SelectFriend | Action::TakeScreenshot => Panel::FriendDetail,
        Action::ScreenshotAll | Action::DeleteAllScreenshots => Panel::Screenshots,
        Action::DeleteScreenshot | Action::SaveScreenshot => Panel::ScreenshotDetail,
    }
}

/// Main application state. Never talks to the network: it queues
/// [`Command`]s and consumes [`Msg`]s.
pub struct App {
    pub should_quit: bool,
    pub show_help: bool,

    history: History,
    /// Deep-link target waiting for its list to load.
    pending: Option<Route>,

    // Cached backend state
    pub friends: Vec<Friend>,
    pub friends_load: Load,
    pub last_sync: Option<f64>,
    pub selected_friend: Option<String>,
    pub screenshots: Vec<Screenshot>,
    pub screenshots_load: Load,

    pub favorites: Favorites,

    // List view state
    pub friends_selected: usize,
    pub screenshots_selected: usize,
    pub filter: String,
    pub input_mode: InputMode,

    pub confirm: Option<Confirm>,
    statuses: HashMap<Panel, Status>,
    busy: HashSet<Action>,
    outbox: Vec<Command>,
    download_dir: PathBuf,
    /// Only used to show screenshot links.
    backend: Option<ApiClient>,
}

impl App {
    pub fn new(favorites: Favorites, download_dir: PathBuf) -> Self {
        Self {
            should_quit: false,
            show_help: false,

            history: History::new(Route::FriendsList),
            pending: None,

            friends: Vec::new(),
            friends_load: Load::Idle,
            last_sync: None,
            selected_friend: None,
            screenshots: Vec::new(),
            screenshots_load: Load::Idle,

            favorites,

            friends_selected: 0,
            screenshots_selected: 0,
            filter: String::new(),
            input_mode: InputMode::Normal,

            confirm: None,
            statuses: HashMap::new(),
            busy: HashSet::new(),
            outbox: Vec::new(),
            download_dir,
            backend: None,
        }
    }

    pub fn with_backend(mut self, api: ApiClient) -> Self {
        self.backend = Some(api);
        self
    }

    /// Remote URL of a screenshot image.
    pub fn screenshot_url(&self, filename: &str) -> Option<String> {
        let api = self.backend.as_ref()?;
        api.screenshot_url(filename).ok().map(|url| url.to_string())
    }

    /// Initial data load, optionally deep-linking to `initial`.
    pub fn start(&mut self, initial: Route) {
        self.load_friends();
        match initial {
            Route::FriendsList => {}
            Route::ScreenshotsList => self.navigate(Route::ScreenshotsList),
            Route::FriendDetail(_) => self.pending = Some(initial),
            Route::ScreenshotDetail(_) => {
                self.load_screenshots();
                self.pending = Some(initial);
            }
        }
    }

    /// Drain the commands queued since the last call.
    pub fn take_commands(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.outbox)
    }

    fn queue(&mut self, command: Command) {
        self.outbox.push(command);
    }

    fn load_friends(&mut self) {
        self.friends_load = Load::Loading;
        self.queue(Command::LoadFriends);
    }

    fn load_screenshots(&mut self) {
        self.screenshots_load = Load::Loading;
        self.queue(Command::LoadScreenshots);
    }

    // ── Routing ──

    pub fn route(&self) -> &Route {
        self.history.current()
    }

    pub fn panel(&self) -> Panel {
        self.route().panel()
    }

    /// Path of the current view, shown like an address bar.
    pub fn location(&self) -> String {
        self.route().to_path()
    }

    pub fn can_go_back(&self) -> bool {
        self.history.can_go_back()
    }

    pub fn can_go_forward(&self) -> bool {
        self.history.can_go_forward()
    }

    /// Move to `target`, falling back to the friends list when it no longer exists.
    pub fn navigate(&mut self, target: Route) {
        self.confirm = None;
        let resolved = router::resolve(target, &self.friends, &self.screenshots);
        if self.history.push(resolved) {
            debug!(location = %self.location(), "navigated");
            self.on_enter();
        }
    }

    pub fn back(&mut self) {
        if let Some(route) = self.history.back().cloned() {
            self.revisit(route);
        }
    }

    pub fn forward(&mut self) {
        if let Some(route) = self.history.forward().cloned() {
            self.revisit(route);
        }
    }

    fn revisit(&mut self, route: Route) {
        self.confirm = None;
        let resolved = router::resolve(route.clone(), &self.friends, &self.screenshots);
        if resolved != route {
            self.history.replace(resolved);
        }
        debug!(location = %self.location(), "history navigation");
        self.on_enter();
    }

    fn on_enter(&mut self) {
        match self.panel() {
            Panel::Screenshots => self.load_screenshots(),
            Panel::Friends => self.clamp_selection(),
            _ => {}
        }
    }

    /// Leave a detail view whose subject disappeared from the reloaded data.
    fn revalidate_current(&mut self) {
        let current = self.route().clone();
        let resolved = router::resolve(current.clone(), &self.friends, &self.screenshots);
        if resolved != current {
            self.history.replace(resolved);
            self.on_enter();
        }
    }

    pub fn show_friends(&mut self) {
        self.navigate(Route::FriendsList);
    }

    pub fn show_screenshots(&mut self) {
        self.navigate(Route::ScreenshotsList);
    }

    pub fn open_selected(&mut self) {
        match self.panel() {
            Panel::Friends => {
                let name = self
                    .visible_friends()
                    .get(self.friends_selected)
                    .map(|row| row.friend.name.clone());
                if let Some(name) = name {
                    self.navigate(Route::FriendDetail(name));
                }
            }
            Panel::Screenshots => {
                let file = self
                    .sorted_screenshots()
                    .get(self.screenshots_selected)
                    .map(|s| s.filename.clone());
                if let Some(file) = file {
                    self.navigate(Route::ScreenshotDetail(file));
                }
            }
            _ => {}
        }
    }

    /// From a friend's detail, jump to their last screenshot.
    pub fn view_last_screenshot(&mut self) {
        let Some(file) = self.current_friend().and_then(|f| f.last_screenshot.clone()) else {
            return;
        };
        if self.screenshots_load == Load::Loaded {
            self.navigate(Route::ScreenshotDetail(file));
        } else {
            self.pending = Some(Route::ScreenshotDetail(file));
            self.load_screenshots();
        }
    }

    pub fn reload(&mut self) {
        match self.panel() {
            Panel::Friends | Panel::FriendDetail => self.load_friends(),
            Panel::Screenshots | Panel::ScreenshotDetail => self.load_screenshots(),
        }
    }

    // ── Derived views ──

    /// Friends in display order: favorites first, each group in backend
    /// order, narrowed by the filter.
    pub fn visible_friends(&self) -> Vec<FriendRow<'_>> {
        let pattern = filter_pattern(&self.filter);
        let (mut favs, rest): (Vec<_>, Vec<_>) = self
            .friends
            .iter()
            .filter(|f| pattern.as_ref().is_none_or(|p| p.matches(&f.name.to_lowercase())))
            .map(|friend| FriendRow {
                friend,
                favorite: self.favorites.is_favorite(&friend.name),
                selected: self.selected_friend.as_deref() == Some(friend.name.as_str()),
            })
            .partition(|row| row.favorite);
        favs.extend(rest);
        favs
    }

    /// Screenshots, newest first.
    pub fn sorted_screenshots(&self) -> Vec<&Screenshot> {
        let mut sorted: Vec<&Screenshot> = self.screenshots.iter().collect();
        sorted.sort_by(|a, b| b.modified.total_cmp(&a.modified));
        sorted
    }

    pub fn current_friend(&self) -> Option<&Friend> {
        match self.route() {
            Route::FriendDetail(name) => self.friends.iter().find(|f| &f.name == name),
            _ => None,
        }
    }

    pub fn current_screenshot(&self) -> Option<&Screenshot> {
        match self.route() {
            Route::ScreenshotDetail(file) => self.screenshots.iter().find(|s| &s.filename == file),
            _ => None,
        }
    }

    /// Whether the backend has the friend on screen right now.
    pub fn is_current_friend_selected(&self) -> bool {
        match (self.current_friend(), &self.selected_friend) {
            (Some(friend), Some(selected)) => &friend.name == selected,
            _ => false,
        }
    }

    // ── List navigation ──

    fn list_len(&self) -> usize {
        match self.panel() {
            Panel::Friends => self.visible_friends().len(),
            Panel::Screenshots => self.screenshots.len(),
            _ => 0,
        }
    }

    fn cursor_mut(&mut self) -> Option<&mut usize> {
        match self.panel() {
            Panel::Friends => Some(&mut self.friends_selected),
            Panel::Screenshots => Some(&mut self.screenshots_selected),
            _ => None,
        }
    }

    pub fn select_next(&mut self) {
        let len = self.list_len();
        if let Some(cursor) = self.cursor_mut() {
            if *cursor + 1 < len {
                *cursor += 1;
            }
        }
    }

    pub fn select_prev(&mut self) {
        if let Some(cursor) = self.cursor_mut() {
            *cursor = cursor.saturating_sub(1);
        }
    }

    pub fn select_first(&mut self) {
        if let Some(cursor) = self.cursor_mut() {
            *cursor = 0;
        }
    }

    pub fn select_last(&mut self) {
        let len = self.list_len();
        if let Some(cursor) = self.cursor_mut() {
            *cursor = len.saturating_sub(1);
        }
    }

    fn clamp_selection(&mut self) {
        let friends = self.visible_friends().len();
        self.friends_selected = self.friends_selected.min(friends.saturating_sub(1));
        self.screenshots_selected = self
            .screenshots_selected
            .min(self.screenshots.len().saturating_sub(1));
    }

    // ── Filter ──

    pub fn push_filter(&mut self, c: char) {
        self.filter.push(c);
        self.friends_selected = 0;
    }

    pub fn pop_filter(&mut self) {
        self.filter.pop();
        self.friends_selected = 0;
    }

    pub fn clear_filter(&mut self) {
        self.filter.clear();
        self.friends_selected = 0;
    }

    // ── Favorites ──

    pub fn toggle_favorite(&mut self, name: &str) -> bool {
        let now = self.favorites.toggle(name);
        self.clamp_selection();
        now
    }

    /// Toggle the highlighted friend in the list, or the friend being viewed.
    pub fn toggle_favorite_here(&mut self) {
        let name = match self.panel() {
            Panel::Friends => self
                .visible_friends()
                .get(self.friends_selected)
                .map(|row| row.friend.name.clone()),
            Panel::FriendDetail => self.current_friend().map(|f| f.name.clone()),
            _ => None,
        };
        if let Some(name) = name {
            self.toggle_favorite(&name);
        }
    }

    // ── Actions ──

    pub fn is_busy(&self, action: Action) -> bool {
        self.busy.contains(&action)
    }

    /// Mark `action` in flight and queue its command, unless it already runs.
    fn begin(&mut self, action: Action, text: &str, command: Command) -> bool {
        if !self.busy.insert(action) {
            debug!(?action, "already running");
            return false;
        }
        self.set_status(action_panel(action), StatusKind::Loading, text.to_string(), None);
        self.queue(command);
        true
    }

    pub fn sync(&mut self) -> bool {
        self.begin(Action::Sync, "Starting sync...", Command::Sync)
    }

    pub fn select_current_friend(&mut self) -> bool {
        let Some(name) = self.current_friend().map(|f| f.name.clone()) else {
            return false;
        };
        self.begin(
            Action::SelectFriend,
            "Selecting friend...",
            Command::SelectFriend { name },
        )
    }

    /// Only allowed once the backend shows the friend being viewed.
    pub fn take_screenshot(&mut self) -> bool {
        if !self.is_current_friend_selected() {
            self.set_status(
                Panel::FriendDetail,
                StatusKind::Error,
                "Select Friend First".to_string(),
                Some(STATUS_TTL),
            );
            return false;
        }
        self.begin(Action::TakeScreenshot, "Taking screenshot...", Command::TakeScreenshot)
    }

    pub fn screenshot_all(&mut self) -> bool {
        self.begin(
            Action::ScreenshotAll,
            "Starting to take screenshots of all friends...",
            Command::ScreenshotAll,
        )
    }

    pub fn request_delete_current(&mut self) {
        if let Some(shot) = self.current_screenshot() {
            self.confirm = Some(Confirm::DeleteScreenshot(shot.filename.clone()));
        }
    }

    pub fn request_delete_all(&mut self) {
        if self.panel() == Panel::Screenshots {
            self.confirm = Some(Confirm::DeleteAll);
        }
    }

    pub fn confirm_yes(&mut self) {
        match self.confirm.take() {
            Some(Confirm::DeleteScreenshot(filename)) => {
                self.begin(
                    Action::DeleteScreenshot,
                    "Deleting screenshot...",
                    Command::DeleteScreenshot { filename },
                );
            }
            Some(Confirm::DeleteAll) => {
                self.begin(
                    Action::DeleteAllScreenshots,
                    "Deleting all screenshots...",
                    Command::DeleteAllScreenshots,
                );
            }
            None => {}
        }
    }

    pub fn confirm_no(&mut self) {
        self.confirm = None;
    }

    pub fn save_current_screenshot(&mut self) -> bool {
        let Some(filename) = self.current_screenshot().map(|s| s.filename.clone()) else {
            return false;
        };
        let dest = self.download_dir.join(&filename);
        self.begin(
            Action::SaveScreenshot,
            "Saving screenshot...",
            Command::SaveScreenshot { filename, dest },
        )
    }

    /// Open the viewed screenshot, or the viewed friend's last one, externally.
    pub fn open_external(&mut self) {
        let filename = match self.panel() {
            Panel::ScreenshotDetail => self.current_screenshot().map(|s| s.filename.clone()),
            Panel::FriendDetail => self.current_friend().and_then(|f| f.last_screenshot.clone()),
            _ => None,
        };
        if let Some(filename) = filename {
            let panel = self.panel();
            self.queue(Command::OpenExternal { filename, panel });
        }
    }

    // ── Worker messages ──

    pub fn handle(&mut self, msg: Msg) {
        match msg {
            Msg::FriendsLoaded(Ok(list)) => self.apply_friends(list),
            Msg::FriendsLoaded(Err(e)) => {
                warn!("loading friends failed: {e}");
                self.friends_load = Load::Failed(e.to_string());
                // An empty list shows the failure in place of its rows.
                if !self.friends.is_empty() {
                    let text = format!("{FRIENDS_LOAD_ERROR}: {e}");
                    for panel in [Panel::Friends, Panel::FriendDetail] {
                        self.set_status(panel, StatusKind::Error, text.clone(), None);
                    }
                }
                if matches!(self.pending, Some(Route::FriendDetail(_))) {
                    self.pending = None;
                }
            }
            Msg::ScreenshotsLoaded(Ok(screenshots)) => {
                info!(count = screenshots.len(), "screenshots loaded");
                self.screenshots = screenshots;
                self.screenshots_load = Load::Loaded;
                self.clamp_selection();
                if let Some(target) = self.take_pending(Panel::ScreenshotDetail) {
                    self.navigate(target);
                }
                self.revalidate_current();
            }
            Msg::ScreenshotsLoaded(Err(e)) => {
                warn!("loading screenshots failed: {e}");
                self.screenshots_load = Load::Failed(e.to_string());
                if matches!(self.pending, Some(Route::ScreenshotDetail(_))) {
                    self.pending = None;
                }
            }
            Msg::Progress { action, text } => {
                if self.is_busy(action) {
                    self.set_status(action_panel(action), StatusKind::Loading, text, None);
                }
            }
            Msg::Finished { action, outcome } => {
                self.busy.remove(&action);
                match outcome {
                    Ok(outcome) => self.on_success(outcome),
                    Err(e) => {
                        let text = format!("{}: {e}", action.failure_label());
                        self.set_status(action_panel(action), StatusKind::Error, text, None);
                    }
                }
            }
            Msg::Opened { panel, outcome } => match outcome {
                Ok(url) => self.set_status(
                    panel,
                    StatusKind::Success,
                    format!("Opening {url}"),
                    Some(STATUS_TTL),
                ),
                Err(e) => self.set_status(
                    panel,
                    StatusKind::Error,
                    format!("Could not open screenshot: {e}"),
                    None,
                ),
            },
        }
    }

    fn apply_friends(&mut self, list: FriendsList) {
        info!(count = list.friends.len(), selected = ?list.selected_friend, "friends loaded");
        self.friends = list.friends;
        self.selected_friend = list.selected_friend;
        self.last_sync = list.last_sync.as_ref().and_then(format::last_sync_timestamp);
        self.friends_load = Load::Loaded;
        for panel in [Panel::Friends, Panel::FriendDetail] {
            if self
                .status(panel)
                .is_some_and(|status| status.text.starts_with(FRIENDS_LOAD_ERROR))
            {
                self.statuses.remove(&panel);
            }
        }
        self.clamp_selection();
        if let Some(target) = self.take_pending(Panel::FriendDetail) {
            self.navigate(target);
        }
        self.revalidate_current();
    }

    fn take_pending(&mut self, panel: Panel) -> Option<Route> {
        if self.pending.as_ref().is_some_and(|route| route.panel() == panel) {
            self.pending.take()
        } else {
            None
        }
    }

    fn on_success(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Synced => {
                self.success(Panel::Friends, "Sync completed! Reloading friends list...".into(), STATUS_TTL);
                self.load_friends();
            }
            Outcome::Selected(name) => {
                info!(%name, "friend selected");
                self.success(Panel::FriendDetail, "Friend selected successfully!".into(), STATUS_TTL);
                self.load_friends();
            }
            Outcome::ScreenshotTaken(file) => {
                info!(file = ?file, "screenshot taken");
                self.success(Panel::FriendDetail, "Screenshot taken successfully!".into(), STATUS_TTL);
                self.load_friends();
                if self.screenshots_load != Load::Idle {
                    self.load_screenshots();
                }
            }
            Outcome::ScreenshotAll(summary) => {
                self.success(Panel::Screenshots, summary.status_text(), SCREENSHOT_ALL_STATUS_TTL);
                self.load_screenshots();
                self.load_friends();
            }
            Outcome::Deleted(file) => {
                self.success(Panel::Screenshots, "Screenshot deleted successfully!".into(), STATUS_TTL);
                if *self.route() == Route::ScreenshotDetail(file) {
                    self.navigate(Route::ScreenshotsList);
                } else {
                    self.load_screenshots();
                }
            }
            Outcome::DeletedAll(count) => {
                self.success(
                    Panel::Screenshots,
                    format!("Deleted {count} screenshots successfully!"),
                    STATUS_TTL,
                );
                self.load_screenshots();
            }
            Outcome::Saved(path) => {
                self.success(
                    Panel::ScreenshotDetail,
                    format!("Saved to {}", path.display()),
                    STATUS_TTL,
                );
            }
        }
    }

    // ── Status lines ──

    fn success(&mut self, panel: Panel, text: String, ttl: Duration) {
        self.set_status(panel, StatusKind::Success, text, Some(ttl));
    }

    fn set_status(&mut self, panel: Panel, kind: StatusKind, text: String, ttl: Option<Duration>) {
        let expires_at = ttl.map(|ttl| Instant::now() + ttl);
        self.statuses.insert(panel, Status { kind, text, expires_at });
    }

    pub fn status(&self, panel: Panel) -> Option<&Status> {
        self.statuses.get(&panel)
    }

    /// Drop status lines whose display time has passed.
    pub fn tick(&mut self, now: Instant) {
        self.statuses
            .retain(|_, status| status.expires_at.is_none_or(|at| at > now));
    }
}

/// Case-insensitive wildcard filter; plain text matches anywhere in the name.
fn filter_pattern(filter: &str) -> Option<WildMatch> {
    let filter = filter.trim().to_lowercase();
    if filter.is_empty() {
        return None;
    }
    if filter.contains(['*', '?']) {
        Some(WildMatch::new(&filter))
    } else {
        Some(WildMatch::new(&format!("*{filter}*")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiError, ScreenshotAllSummary};

    fn friend(name: &str) -> Friend {
        Friend {
            name: name.to_string(),
            last_screenshot: None,
            last_screenshot_time: None,
        }
    }

    fn shot(name: &str, ts: f64) -> Screenshot {
        Screenshot {
            filename: name.to_string(),
            modified: ts,
        }
    }

    fn app() -> App {
        App::new(Favorites::in_memory(Vec::new()), PathBuf::from("/tmp/downloads"))
    }

    fn loaded_app() -> App {
        let mut app = app();
        app.start(Route::FriendsList);
        app.take_commands();
        app.handle(Msg::FriendsLoaded(Ok(FriendsList {
            friends: vec![friend("anna"), friend("bob"), friend("mike smith")],
            last_sync: None,
            selected_friend: Some("bob".to_string()),
        })));
        app
    }

    fn names(app: &App) -> Vec<String> {
        app.visible_friends()
            .iter()
            .map(|row| row.friend.name.clone())
            .collect()
    }

    #[test]
    fn test_start_loads_friends() {
        let mut app = app();
        app.start(Route::FriendsList);
        assert_eq!(app.take_commands(), vec![Command::LoadFriends]);
        assert_eq!(app.friends_load, Load::Loading);
        assert!(app.take_commands().is_empty());
    }

    #[test]
    fn test_screenshots_sorted_newest_first() {
        let mut app = app();
        app.handle(Msg::ScreenshotsLoaded(Ok(vec![shot("a.png", 100.0), shot("b.png", 200.0)])));
        let order: Vec<&str> = app
            .sorted_screenshots()
            .iter()
            .map(|s| s.filename.as_str())
            .collect();
        assert_eq!(order, ["b.png", "a.png"]);
    }

    #[test]
    fn test_favorites_first_preserving_order() {
        let mut app = loaded_app();
        assert_eq!(names(&app), ["anna", "bob", "mike smith"]);

        app.toggle_favorite("Mike Smyth");
        app.toggle_favorite("bob");
        assert_eq!(names(&app), ["bob", "mike smith", "anna"]);

        let rows = app.visible_friends();
        assert!(rows[0].favorite && rows[0].selected);
        assert!(rows[1].favorite && !rows[1].selected);
        assert!(!rows[2].favorite);
    }

    #[test]
    fn test_toggle_twice_restores_favorites() {
        let mut app = loaded_app();
        app.toggle_favorite("anna");
        let before = app.favorites.names().to_vec();
        app.toggle_favorite("bob");
        app.toggle_favorite("bob");
        assert_eq!(app.favorites.names(), before.as_slice());
    }

    #[test]
    fn test_filter_plain_and_wildcard() {
        let mut app = loaded_app();
        for c in "MIKE".chars() {
            app.push_filter(c);
        }
        assert_eq!(names(&app), ["mike smith"]);

        app.clear_filter();
        for c in "?o*".chars() {
            app.push_filter(c);
        }
        assert_eq!(names(&app), ["bob"]);
    }

    #[test]
    fn test_navigate_to_missing_friend_falls_back() {
        let mut app = loaded_app();
        app.navigate(Route::FriendDetail("anna".into()));
        assert_eq!(app.panel(), Panel::FriendDetail);
        assert_eq!(app.location(), "/friends/anna");

        app.navigate(Route::FriendDetail("zed".into()));
        assert_eq!(app.route(), &Route::FriendsList);
    }

    #[test]
    fn test_entering_screenshots_reloads_them() {
        let mut app = loaded_app();
        app.show_screenshots();
        assert_eq!(app.take_commands(), vec![Command::LoadScreenshots]);
        assert_eq!(app.screenshots_load, Load::Loading);
    }

    #[test]
    fn test_back_and_forward() {
        let mut app = loaded_app();
        app.navigate(Route::FriendDetail("anna".into()));
        app.show_screenshots();
        app.back();
        assert_eq!(app.route(), &Route::FriendDetail("anna".into()));
        app.back();
        assert_eq!(app.route(), &Route::FriendsList);
        app.forward();
        assert_eq!(app.route(), &Route::FriendDetail("anna".into()));
    }

    #[test]
    fn test_back_to_vanished_friend_replaces_entry() {
        let mut app = loaded_app();
        app.navigate(Route::FriendDetail("anna".into()));
        app.show_screenshots();
        app.handle(Msg::FriendsLoaded(Ok(FriendsList {
            friends: vec![friend("bob")],
            ..FriendsList::default()
        })));
        app.back();
        assert_eq!(app.route(), &Route::FriendsList);
        app.forward();
        assert_eq!(app.route(), &Route::ScreenshotsList);
    }

    #[test]
    fn test_deep_link_waits_for_friends() {
        let mut app = app();
        app.start(Route::FriendDetail("bob".into()));
        assert_eq!(app.route(), &Route::FriendsList);
        app.handle(Msg::FriendsLoaded(Ok(FriendsList {
            friends: vec![friend("bob")],
            ..FriendsList::default()
        })));
        assert_eq!(app.route(), &Route::FriendDetail("bob".into()));
    }

    #[test]
    fn test_deep_link_to_screenshot_loads_screenshots() {
        let mut app = app();
        app.start(Route::ScreenshotDetail("b.png".into()));
        assert_eq!(
            app.take_commands(),
            vec![Command::LoadFriends, Command::LoadScreenshots]
        );
        app.handle(Msg::ScreenshotsLoaded(Ok(vec![shot("a.png", 1.0)])));
        assert_eq!(app.route(), &Route::FriendsList);
    }

    #[test]
    fn test_failed_load_drops_deep_link() {
        let mut app = app();
        app.start(Route::FriendDetail("bob".into()));
        app.handle(Msg::FriendsLoaded(Err(ApiError::Status {
            status: 500,
            message: "HTTP 500".into(),
        })));
        assert_eq!(app.friends_load, Load::Failed("HTTP 500".into()));
        app.handle(Msg::FriendsLoaded(Ok(FriendsList {
            friends: vec![friend("bob")],
            ..FriendsList::default()
        })));
        assert_eq!(app.route(), &Route::FriendsList);
    }

    #[test]
    fn test_failed_reload_keeps_rows_and_reports_error() {
        let mut app = loaded_app();
        app.reload();
        app.take_commands();
        app.handle(Msg::FriendsLoaded(Err(ApiError::Status {
            status: 500,
            message: "backend exploded".into(),
        })));

        assert_eq!(names(&app).len(), 3);
        for panel in [Panel::Friends, Panel::FriendDetail] {
            let status = app.status(panel).unwrap();
            assert_eq!(status.kind, StatusKind::Error);
            assert_eq!(status.text, "Error loading friends: backend exploded");
        }

        app.reload();
        app.handle(Msg::FriendsLoaded(Ok(FriendsList {
            friends: vec![friend("anna")],
            ..FriendsList::default()
        })));
        assert!(app.status(Panel::Friends).is_none());
        assert!(app.status(Panel::FriendDetail).is_none());
    }

    #[test]
    fn test_first_load_failure_leaves_status_to_placeholder() {
        let mut app = app();
        app.start(Route::FriendsList);
        app.handle(Msg::FriendsLoaded(Err(ApiError::TimedOut)));
        assert!(app.status(Panel::Friends).is_none());
    }

    #[test]
    fn test_busy_action_is_not_resubmitted() {
        let mut app = loaded_app();
        app.take_commands();
        assert!(app.sync());
        assert!(!app.sync());
        assert_eq!(app.take_commands(), vec![Command::Sync]);
        assert!(app.is_busy(Action::Sync));
        assert_eq!(app.status(Panel::Friends).unwrap().kind, StatusKind::Loading);

        app.handle(Msg::Progress {
            action: Action::Sync,
            text: "Syncing friends list... This may take a while.".into(),
        });
        assert_eq!(
            app.status(Panel::Friends).unwrap().text,
            "Syncing friends list... This may take a while."
        );

        app.handle(Msg::Finished {
            action: Action::Sync,
            outcome: Ok(Outcome::Synced),
        });
        assert!(!app.is_busy(Action::Sync));
        assert_eq!(app.take_commands(), vec![Command::LoadFriends]);
        assert_eq!(app.status(Panel::Friends).unwrap().kind, StatusKind::Success);
        assert!(app.sync());
    }

    #[test]
    fn test_action_failure_shows_error() {
        let mut app = loaded_app();
        app.sync();
        app.handle(Msg::Finished {
            action: Action::Sync,
            outcome: Err(ApiError::TimedOut),
        });
        let status = app.status(Panel::Friends).unwrap();
        assert_eq!(status.kind, StatusKind::Error);
        assert_eq!(status.text, "Sync failed: Task timed out");
    }

    #[test]
    fn test_screenshot_requires_backend_selection() {
        let mut app = loaded_app();
        app.take_commands();
        app.navigate(Route::FriendDetail("anna".into()));
        assert!(!app.is_current_friend_selected());
        assert!(!app.take_screenshot());
        assert_eq!(app.status(Panel::FriendDetail).unwrap().text, "Select Friend First");

        assert!(app.select_current_friend());
        assert_eq!(
            app.take_commands(),
            vec![Command::SelectFriend { name: "anna".into() }]
        );
        app.handle(Msg::Finished {
            action: Action::SelectFriend,
            outcome: Ok(Outcome::Selected("anna".into())),
        });
        app.handle(Msg::FriendsLoaded(Ok(FriendsList {
            friends: vec![friend("anna"), friend("bob")],
            last_sync: None,
            selected_friend: Some("anna".into()),
        })));
        assert!(app.is_current_friend_selected());
        app.take_commands();
        assert!(app.take_screenshot());
        assert_eq!(app.take_commands(), vec![Command::TakeScreenshot]);
    }

    #[test]
    fn test_delete_requires_confirmation_then_returns_to_list() {
        let mut app = loaded_app();
        app.handle(Msg::ScreenshotsLoaded(Ok(vec![shot("a.png", 1.0), shot("b.png", 2.0)])));
        app.navigate(Route::ScreenshotDetail("a.png".into()));
        app.take_commands();

        app.request_delete_current();
        assert_eq!(app.confirm, Some(Confirm::DeleteScreenshot("a.png".into())));
        app.confirm_no();
        assert!(app.take_commands().is_empty());

        app.request_delete_current();
        app.confirm_yes();
        assert_eq!(
            app.take_commands(),
            vec![Command::DeleteScreenshot { filename: "a.png".into() }]
        );

        app.handle(Msg::Finished {
            action: Action::DeleteScreenshot,
            outcome: Ok(Outcome::Deleted("a.png".into())),
        });
        assert_eq!(app.route(), &Route::ScreenshotsList);
        assert_eq!(app.take_commands(), vec![Command::LoadScreenshots]);
        assert_eq!(
            app.status(Panel::Screenshots).unwrap().text,
            "Screenshot deleted successfully!"
        );
    }

    #[test]
    fn test_delete_all_and_screenshot_all() {
        let mut app = loaded_app();
        app.show_screenshots();
        app.take_commands();

        app.request_delete_all();
        assert_eq!(app.confirm, Some(Confirm::DeleteAll));
        app.confirm_yes();
        assert_eq!(app.take_commands(), vec![Command::DeleteAllScreenshots]);
        app.handle(Msg::Finished {
            action: Action::DeleteAllScreenshots,
            outcome: Ok(Outcome::DeletedAll(4)),
        });
        assert_eq!(
            app.status(Panel::Screenshots).unwrap().text,
            "Deleted 4 screenshots successfully!"
        );
        app.take_commands();

        assert!(app.screenshot_all());
        app.handle(Msg::Finished {
            action: Action::ScreenshotAll,
            outcome: Ok(Outcome::ScreenshotAll(ScreenshotAllSummary {
                successful: 2,
                failed: vec![("bob".into(), "not found".into())],
            })),
        });
        assert_eq!(
            app.status(Panel::Screenshots).unwrap().text,
            "Screenshots completed! 2 successful, 1 failed"
        );
    }

    #[test]
    fn test_save_goes_to_download_dir() {
        let mut app = loaded_app();
        app.handle(Msg::ScreenshotsLoaded(Ok(vec![shot("a.png", 1.0)])));
        app.navigate(Route::ScreenshotDetail("a.png".into()));
        app.take_commands();
        assert!(app.save_current_screenshot());
        assert_eq!(
            app.take_commands(),
            vec![Command::SaveScreenshot {
                filename: "a.png".into(),
                dest: PathBuf::from("/tmp/downloads/a.png"),
            }]
        );
    }

    #[test]
    fn test_view_last_screenshot_loads_when_needed() {
        let mut app = app();
        app.start(Route::FriendsList);
        app.handle(Msg::FriendsLoaded(Ok(FriendsList {
            friends: vec![Friend {
                name: "anna".into(),
                last_screenshot: Some("anna_1.png".into()),
                last_screenshot_time: Some(1.0),
            }],
            ..FriendsList::default()
        })));
        app.navigate(Route::FriendDetail("anna".into()));
        app.take_commands();

        app.view_last_screenshot();
        assert_eq!(app.take_commands(), vec![Command::LoadScreenshots]);
        app.handle(Msg::ScreenshotsLoaded(Ok(vec![shot("anna_1.png", 1.0)])));
        assert_eq!(app.route(), &Route::ScreenshotDetail("anna_1.png".into()));
    }

    #[test]
    fn test_success_status_expires() {
        let mut app = loaded_app();
        app.sync();
        app.handle(Msg::Finished {
            action: Action::Sync,
            outcome: Ok(Outcome::Synced),
        });
        app.tick(Instant::now());
        assert!(app.status(Panel::Friends).is_some());
        app.tick(Instant::now() + STATUS_TTL + Duration::from_millis(1));
        assert!(app.status(Panel::Friends).is_none());
    }

    #[test]
    fn test_screenshot_links_need_a_backend() {
        let app = loaded_app();
        assert_eq!(app.screenshot_url("a.png"), None);

        let app = app.with_backend(ApiClient::new("http://127.0.0.1:5050").unwrap());
        assert_eq!(
            app.screenshot_url("a.png").as_deref(),
            Some("http://127.0.0.1:5050/api/get_screenshot?filename=a.png")
        );
    }

    #[test]
    fn test_list_cursor_stays_in_bounds() {
        let mut app = loaded_app();
        app.select_last();
        assert_eq!(app.friends_selected, 2);
        app.select_next();
        assert_eq!(app.friends_selected, 2);
        app.select_first();
        app.select_prev();
        assert_eq!(app.friends_selected, 0);
        app.select_next();
        app.open_selected();
        assert_eq!(app.route(), &Route::FriendDetail("bob".into()));
    }
}
