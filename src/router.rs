use crate::api::{Friend, Screenshot};

/// The four mutually exclusive views.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    FriendsList,
    FriendDetail(String),
    ScreenshotsList,
    ScreenshotDetail(String),
}

/// The panel a route renders into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Panel {
    Friends,
    FriendDetail,
    Screenshots,
    ScreenshotDetail,
}

impl Route {
    pub fn panel(&self) -> Panel {
        match self {
            Self::FriendsList => Panel::Friends,
            Self::FriendDetail(_) => Panel::FriendDetail,
            Self::ScreenshotsList => Panel::Screenshots,
            Self::ScreenshotDetail(_) => Panel::ScreenshotDetail,
        }
    }

    /// Parse a location path. Anything unrecognised is the friends list.
    pub fn from_path(path: &str) -> Self {
        let trimmed = path.trim().trim_start_matches('/');
        let (head, rest) = match trimmed.split_once('/') {
            Some((head, rest)) => (head, rest.trim_end_matches('/')),
            None => (trimmed, ""),
        };
        match (head, rest) {
            ("friends", "") => Self::FriendsList,
            ("friends", name) => Self::FriendDetail(name.to_string()),
            ("screenshots", "") => Self::ScreenshotsList,
            ("screenshots", file) => Self::ScreenshotDetail(file.to_string()),
            _ => Self::FriendsList,
        }
    }

    pub fn to_path(&self) -> String {
        match self {
            Self::FriendsList => "/".to_string(),
            Self::FriendDetail(name) => format!("/friends/{name}"),
            Self::ScreenshotsList => "/screenshots".to_string(),
            Self::ScreenshotDetail(file) => format!("/screenshots/{file}"),
        }
    }
}

/// Check a target against the cached lists; missing targets fall back to the
/// friends list.
pub fn resolve(target: Route, friends: &[Friend], screenshots: &[Screenshot]) -> Route {
    match &target {
        Route::FriendDetail(name) if !friends.iter().any(|f| &f.name == name) => {
            tracing::warn!(name = %name, "friend not found in loaded data");
            Route::FriendsList
        }
        Route::ScreenshotDetail(file) if !screenshots.iter().any(|s| &s.filename == file) => {
            tracing::warn!(filename = %file, "screenshot not found in loaded data");
            Route::FriendsList
        }
        _ => target,
    }
}

/// Back/forward stack of visited routes. Never empty.
#[derive(Debug, Clone)]
pub struct History {
    entries: Vec<Route>,
    index: usize,
}

impl History {
    pub fn new(initial: Route) -> Self {
        Self {
            entries: vec![initial],
            index: 0,
        }
    }

    pub fn current(&self) -> &Route {
        &self.entries[self.index]
    }

    /// Push a new entry, dropping any forward entries. Pushing the current
    /// route is a no-op; returns whether anything changed.
    pub fn push(&mut self, route: Route) -> bool {
        if *self.current() == route {
            return false;
        }
        self.entries.truncate(self.index + 1);
        self.entries.push(route);
        self.index += 1;
        true
    }

    pub fn replace(&mut self, route: Route) {
        self.entries[self.index] = route;
    }

    pub fn back(&mut self) -> Option<&Route> {
        if self.index == 0 {
            return None;
        }
        self.index -= 1;
        Some(self.current())
    }

    pub fn forward(&mut self) -> Option<&Route> {
        if self.index + 1 >= self.entries.len() {
            return None;
        }
        self.index += 1;
        Some(self.current())
    }

    pub fn can_go_back(&self) -> bool {
        self.index > 0
    }

    pub fn can_go_forward(&self) -> bool {
        self.index + 1 < self.entries.len()
    }
}
