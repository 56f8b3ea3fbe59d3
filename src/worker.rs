use serde_json::Value;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::{debug, info, warn};

use crate::api::{ApiClient, ApiError, FriendsList, Screenshot, ScreenshotAllSummary, TaskStarted};
use crate::config::Timeouts;
use crate::router::Panel;
use crate::task::wait_for_task;

/// User-triggered backend operations. At most one of each runs at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Sync,
    SelectFriend,
    TakeScreenshot,
    ScreenshotAll,
    DeleteScreenshot,
    DeleteAllScreenshots,
    SaveScreenshot,
}

impl Action {
    /// Prefix of the status line when the action fails.
    pub fn failure_label(self) -> &'static str {
        match self {
            Self::Sync => "Sync failed",
            Self::SelectFriend => "Selection failed",
            Self::TakeScreenshot => "Screenshot failed",
            Self::ScreenshotAll => "Screenshot all failed",
            Self::DeleteScreenshot | Self::DeleteAllScreenshots => "Delete failed",
            Self::SaveScreenshot => "Save failed",
        }
    }
}

/// Work requested by the view model.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    LoadFriends,
    LoadScreenshots,
    Sync,
    SelectFriend { name: String },
    TakeScreenshot,
    ScreenshotAll,
    DeleteScreenshot { filename: String },
    DeleteAllScreenshots,
    SaveScreenshot { filename: String, dest: PathBuf },
    OpenExternal { filename: String, panel: Panel },
}

/// Successful result of an [`Action`].
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Synced,
    Selected(String),
    ScreenshotTaken(Option<String>),
    ScreenshotAll(ScreenshotAllSummary),
    Deleted(String),
    DeletedAll(usize),
    Saved(PathBuf),
}

/// Messages sent from worker tasks back to the UI loop.
#[derive(Debug)]
pub enum Msg {
    FriendsLoaded(Result<FriendsList, ApiError>),
    ScreenshotsLoaded(Result<Vec<Screenshot>, ApiError>),
    /// The backend accepted the action and it is now being polled.
    Progress { action: Action, text: String },
    Finished {
        action: Action,
        outcome: Result<Outcome, ApiError>,
    },
    Opened {
        panel: Panel,
        outcome: Result<String, ApiError>,
    },
}

/// Orders responses to repeated loads of one list.
///
/// Every request takes a ticket when dispatched. A response is delivered
/// only if no later ticket has been delivered already.
#[derive(Debug, Default)]
struct Latest {
    issued: AtomicU64,
    delivered: AtomicU64,
}

impl Latest {
    fn issue(&self) -> u64 {
        self.issued.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn accept(&self, ticket: u64) -> bool {
        self.delivered.fetch_max(ticket, Ordering::SeqCst) < ticket
    }
}

/// Runs [`Command`]s on the tokio runtime.
#[derive(Clone)]
pub struct Worker {
    api: Arc<ApiClient>,
    timeouts: Timeouts,
    tx: UnboundedSender<Msg>,
    friends: Arc<Latest>,
    screenshots: Arc<Latest>,
}

impl Worker {
    pub fn new(api: Arc<ApiClient>, timeouts: Timeouts) -> (Self, UnboundedReceiver<Msg>) {
        let (tx, rx) = unbounded_channel();
        let worker = Self {
            api,
            timeouts,
            tx,
            friends: Arc::default(),
            screenshots: Arc::default(),
        };
        (worker, rx)
    }

    pub fn dispatch(&self, command: Command) {
        debug!(?command, "dispatching");
        let ticket = self.ticket(&command);
        let worker = self.clone();
        tokio::spawn(async move {
            let msg = worker.execute(command).await;
            if let Some((latest, ticket)) = ticket {
                if !latest.accept(ticket) {
                    debug!(ticket, "dropping stale list response");
                    return;
                }
            }
            // The receiver is gone only when the UI has exited.
            let _ = worker.tx.send(msg);
        });
    }

    fn ticket(&self, command: &Command) -> Option<(Arc<Latest>, u64)> {
        let latest = match command {
            Command::LoadFriends => &self.friends,
            Command::LoadScreenshots => &self.screenshots,
            _ => return None,
        };
        Some((latest.clone(), latest.issue()))
    }

    async fn execute(&self, command: Command) -> Msg {
        let api = &*self.api;
        let t = self.timeouts;
        match command {
            Command::LoadFriends => Msg::FriendsLoaded(api.friends_list().await),
            Command::LoadScreenshots => Msg::ScreenshotsLoaded(api.list_screenshots().await),
            Command::Sync => {
                let outcome = async {
                    let started = api.sync().await?;
                    self.poll(Action::Sync, started, t.sync, "Syncing friends list... This may take a while.")
                        .await?;
                    Ok::<_, ApiError>(Outcome::Synced)
                }
                .await;
                finished(Action::Sync, outcome)
            }
            Command::SelectFriend { name } => {
                let outcome = async {
                    let started = api.select_friend(&name).await?;
                    self.poll(Action::SelectFriend, started, t.select, "Selecting friend...")
                        .await?;
                    Ok::<_, ApiError>(Outcome::Selected(name))
                }
                .await;
                finished(Action::SelectFriend, outcome)
            }
            Command::TakeScreenshot => {
                let outcome = async {
                    let started = api.take_screenshot().await?;
                    let result = self
                        .poll(Action::TakeScreenshot, started, t.screenshot, "Taking screenshot...")
                        .await?;
                    Ok::<_, ApiError>(Outcome::ScreenshotTaken(result.as_str().map(str::to_string)))
                }
                .await;
                finished(Action::TakeScreenshot, outcome)
            }
            Command::ScreenshotAll => {
                let outcome = async {
                    let mut started = api.screenshot_all().await?;
                    let text = format!(
                        "{} (This may take a few minutes)",
                        started
                            .message
                            .take()
                            .unwrap_or_else(|| "Taking screenshots of all friends".to_string())
                    );
                    let result = self
                        .poll(Action::ScreenshotAll, started, t.screenshot_all, &text)
                        .await?;
                    let summary = ScreenshotAllSummary::from_result(&result);
                    for (name, error) in &summary.failed {
                        warn!(friend = %name, %error, "screenshot failed");
                    }
                    Ok::<_, ApiError>(Outcome::ScreenshotAll(summary))
                }
                .await;
                finished(Action::ScreenshotAll, outcome)
            }
            Command::DeleteScreenshot { filename } => {
                let deleted = api.delete_screenshot(&filename).await;
                let outcome = deleted.map(|message| {
                    info!(%message);
                    Outcome::Deleted(filename)
                });
                finished(Action::DeleteScreenshot, outcome)
            }
            Command::DeleteAllScreenshots => {
                let outcome = api
                    .delete_all_screenshots()
                    .await
                    .map(|deleted| Outcome::DeletedAll(deleted.len()));
                finished(Action::DeleteAllScreenshots, outcome)
            }
            Command::SaveScreenshot { filename, dest } => {
                let outcome = async {
                    let bytes = api.get_screenshot(&filename).await?.bytes().await?;
                    if let Some(parent) = dest.parent() {
                        tokio::fs::create_dir_all(parent).await?;
                    }
                    tokio::fs::write(&dest, &bytes).await?;
                    info!(path = %dest.display(), bytes = bytes.len(), "saved screenshot");
                    Ok::<_, ApiError>(Outcome::Saved(dest))
                }
                .await;
                finished(Action::SaveScreenshot, outcome)
            }
            Command::OpenExternal { filename, panel } => Msg::Opened {
                panel,
                outcome: open_external(api, &filename),
            },
        }
    }

    /// Report progress, then poll the started task to completion.
    async fn poll(
        &self,
        action: Action,
        started: TaskStarted,
        max_wait: Duration,
        text: &str,
    ) -> Result<Value, ApiError> {
        debug!(?action, task_id = %started.task_id, "task started");
        let _ = self.tx.send(Msg::Progress {
            action,
            text: text.to_string(),
        });
        wait_for_task(&*self.api, &started.task_id, max_wait, self.timeouts.poll_interval).await
    }
}

fn finished(action: Action, outcome: Result<Outcome, ApiError>) -> Msg {
    match &outcome {
        Ok(result) => info!(?action, ?result, "action finished"),
        Err(e) => warn!(?action, timeout = e.is_timeout(), "action failed: {e}"),
    }
    Msg::Finished { action, outcome }
}

/// Hand the screenshot URL to the desktop's default viewer.
fn open_external(api: &ApiClient, filename: &str) -> Result<String, ApiError> {
    let url = api.screenshot_url(filename)?;
    let opener = if cfg!(target_os = "macos") { "open" } else { "xdg-open" };
    let mut command = tokio::process::Command::new(opener);
    command.arg(url.as_str());
    spawn_reaped(command)?;
    Ok(url.to_string())
}

/// Spawn a detached helper process and wait on it in the background.
fn spawn_reaped(
    mut command: tokio::process::Command,
) -> std::io::Result<tokio::task::JoinHandle<Option<ExitStatus>>> {
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;
    let program = format!("{:?}", command.as_std().get_program());
    Ok(tokio::spawn(async move {
        match child.wait().await {
            Ok(status) => {
                if !status.success() {
                    warn!(%program, %status, "helper exited with failure");
                }
                Some(status)
            }
            Err(e) => {
                warn!(%program, "waiting for helper failed: {e}");
                None
            }
        }
    }))
}
