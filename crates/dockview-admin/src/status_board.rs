#![forbid(unsafe_code)]

//! Container status board.
//!
//! While shown, the board polls its [`SystemSource`] on an interval
//! subscription. Hiding the board drops the subscription from the declared
//! set and the runtime stops the timer.

use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use dockview_core::{
    ContainerStatus, FetchError, StatusIndicator, SystemSnapshot, SystemSource, ViewerConfig,
    display_name,
};
use dockview_runtime::{Cmd, Every, Model, SubId, Subscription};

/// Subscription id of the status poll timer.
pub const STATUS_POLL_ID: SubId = 0x5354_4154_5553;

#[derive(Debug)]
pub enum BoardMsg {
    Show,
    Hide,
    /// Poll tick, or an explicit refresh.
    Poll,
    Loaded(Result<SystemSnapshot, FetchError>),
}

pub struct StatusBoard {
    source: Arc<dyn SystemSource>,
    interval: Duration,
    name_prefix: Option<String>,
    snapshot: Option<SystemSnapshot>,
    last_error: Option<FetchError>,
    open: bool,
    in_flight: bool,
}

impl StatusBoard {
    pub fn new(source: Arc<dyn SystemSource>, config: &ViewerConfig) -> Self {
        Self {
            source,
            interval: config.poll_interval,
            name_prefix: config.name_prefix.clone(),
            snapshot: None,
            last_error: None,
            open: false,
            in_flight: false,
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn is_polling(&self) -> bool {
        self.in_flight
    }

    /// Last successful snapshot. Kept across failed polls.
    pub fn snapshot(&self) -> Option<&SystemSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn last_error(&self) -> Option<&FetchError> {
        self.last_error.as_ref()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Containers in board order.
    pub fn containers(&self) -> &[ContainerStatus] {
        self.snapshot
            .as_ref()
            .map(|snapshot| snapshot.components.as_slice())
            .unwrap_or_default()
    }

    /// Resolve a container by full name, display name, or 1-based position.
    pub fn resolve(&self, key: &str) -> Option<&ContainerStatus> {
        let containers = self.containers();
        if let Ok(index) = key.parse::<usize>() {
            return index.checked_sub(1).and_then(|i| containers.get(i));
        }
        containers.iter().find(|c| c.name == key).or_else(|| {
            containers
                .iter()
                .find(|c| display_name(&c.name, self.name_prefix.as_deref()) == key)
        })
    }

    fn poll(&mut self) -> Cmd<BoardMsg> {
        if !self.open || self.in_flight {
            return Cmd::none();
        }
        self.in_flight = true;
        let source = Arc::clone(&self.source);
        Cmd::task_named("status-poll", move || BoardMsg::Loaded(source.fetch_system()))
    }
}

impl Model for StatusBoard {
    type Message = BoardMsg;

    fn update(&mut self, msg: BoardMsg) -> Cmd<BoardMsg> {
        match msg {
            BoardMsg::Show => {
                self.open = true;
                self.poll()
            }
            BoardMsg::Hide => {
                self.open = false;
                Cmd::none()
            }
            BoardMsg::Poll => self.poll(),
            BoardMsg::Loaded(result) => {
                self.in_flight = false;
                match result {
                    Ok(snapshot) => {
                        tracing::debug!(containers = snapshot.components.len(), "status snapshot loaded");
                        self.snapshot = Some(snapshot);
                        self.last_error = None;
                        Cmd::none()
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "status poll failed");
                        let line = format!("status: {err}");
                        self.last_error = Some(err);
                        Cmd::log(line)
                    }
                }
            }
        }
    }

    fn view(&self) -> String {
        if !self.open {
            return String::new();
        }
        let mut out = String::from("Containers");
        if let Some(err) = &self.last_error {
            let _ = write!(out, "  (stale: {err})");
        }
        if self.snapshot.is_none() {
            out.push_str("\n  loading...");
            return out;
        }
        for (i, container) in self.containers().iter().enumerate() {
            let _ = write!(
                out,
                "\n{:>3}. {:<24} {:<8} {:<20} {}",
                i + 1,
                display_name(&container.name, self.name_prefix.as_deref()),
                container.indicator().label(),
                container.image_name(),
                container.primary_port().unwrap_or("-"),
            );
            if container.indicator() != StatusIndicator::Healthy && !container.status.is_empty() {
                let _ = write!(out, "  [{}]", container.status);
            }
        }
        out
    }

    fn subscriptions(&self) -> Vec<Box<dyn Subscription<BoardMsg>>> {
        if self.open {
            vec![Box::new(Every::with_id(STATUS_POLL_ID, self.interval, || BoardMsg::Poll))]
        } else {
            vec![]
        }
    }
}
