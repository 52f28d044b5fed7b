#![forbid(unsafe_code)]

//! Elm-style runtime for headless applications.
//!
//! The program owns a [`Model`], feeds it messages from three places
//! (external input, background task results, and subscriptions), executes
//! the [`Cmd`]s it returns, and re-renders the model's text view after
//! every batch of updates.
//!
//! # Example
//!
//! ```ignore
//! use dockview_runtime::program::{Cmd, Model};
//!
//! struct Counter {
//!     count: i32,
//! }
//!
//! enum Msg {
//!     Increment,
//!     Quit,
//! }
//!
//! impl Model for Counter {
//!     type Message = Msg;
//!
//!     fn update(&mut self, msg: Self::Message) -> Cmd<Self::Message> {
//!         match msg {
//!             Msg::Increment => { self.count += 1; Cmd::none() }
//!             Msg::Quit => Cmd::quit(),
//!         }
//!     }
//!
//!     fn view(&self) -> String {
//!         format!("count: {}", self.count)
//!     }
//! }
//! ```

use std::io::{self, Write};
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::{debug, debug_span, info_span};

use crate::subscription::{Subscription, SubscriptionManager};

/// Application state and behavior.
pub trait Model: Sized {
    /// Messages that drive state transitions.
    type Message: Send + 'static;

    /// Startup commands. Called once before the first render.
    fn init(&mut self) -> Cmd<Self::Message> {
        Cmd::none()
    }

    /// Apply one message. Returns commands for any side effects.
    fn update(&mut self, msg: Self::Message) -> Cmd<Self::Message>;

    /// Render the current state as text.
    fn view(&self) -> String {
        String::new()
    }

    /// Declare active subscriptions.
    ///
    /// Called after each batch of updates. The runtime compares the returned
    /// set (by `SubId`) against running subscriptions and starts or stops
    /// them as needed. Returning an empty vec stops all subscriptions.
    fn subscriptions(&self) -> Vec<Box<dyn Subscription<Self::Message>>> {
        vec![]
    }
}

/// Diagnostics metadata for background tasks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskSpec {
    /// Optional task name for logging.
    pub name: Option<String>,
}

impl TaskSpec {
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
        }
    }
}

/// Commands represent side effects to be executed by the runtime.
#[derive(Default)]
pub enum Cmd<M> {
    /// No operation.
    #[default]
    None,
    /// Stop the program.
    Quit,
    /// Execute multiple commands in order, stopping early after a quit.
    Batch(Vec<Cmd<M>>),
    /// Write a line to the program's output above the view.
    Log(String),
    /// Run a blocking closure on a background thread and deliver its
    /// result to the model as a message.
    Task(TaskSpec, Box<dyn FnOnce() -> M + Send>),
}

impl<M: std::fmt::Debug> std::fmt::Debug for Cmd<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Quit => write!(f, "Quit"),
            Self::Batch(cmds) => f.debug_tuple("Batch").field(cmds).finish(),
            Self::Log(s) => f.debug_tuple("Log").field(s).finish(),
            Self::Task(spec, _) => f.debug_struct("Task").field("spec", spec).finish(),
        }
    }
}

impl<M> Cmd<M> {
    #[inline]
    pub fn none() -> Self {
        Self::None
    }

    #[inline]
    pub fn quit() -> Self {
        Self::Quit
    }

    #[inline]
    pub fn log(msg: impl Into<String>) -> Self {
        Self::Log(msg.into())
    }

    /// Create a batch of commands, collapsing empty and single batches.
    pub fn batch(mut cmds: Vec<Self>) -> Self {
        cmds.retain(|c| !matches!(c, Self::None));
        if cmds.len() > 1 {
            return Self::Batch(cmds);
        }
        cmds.pop().unwrap_or(Self::None)
    }

    /// A background task.
    pub fn task<F>(f: F) -> Self
    where
        F: FnOnce() -> M + Send + 'static,
    {
        Self::Task(TaskSpec::default(), Box::new(f))
    }

    /// A named background task.
    pub fn task_named<F>(name: impl Into<String>, f: F) -> Self
    where
        F: FnOnce() -> M + Send + 'static,
    {
        Self::Task(TaskSpec::named(name), Box::new(f))
    }

    /// Convert the messages this command produces, so a child model's
    /// commands can be returned from a parent's `update`.
    pub fn map<N>(self, f: impl Fn(M) -> N + Send + Sync + 'static) -> Cmd<N>
    where
        M: 'static,
        N: 'static,
    {
        let f: Arc<dyn Fn(M) -> N + Send + Sync> = Arc::new(f);
        self.map_with(&f)
    }

    fn map_with<N>(self, f: &Arc<dyn Fn(M) -> N + Send + Sync>) -> Cmd<N>
    where
        M: 'static,
        N: 'static,
    {
        match self {
            Self::None => Cmd::None,
            Self::Quit => Cmd::Quit,
            Self::Batch(cmds) => Cmd::Batch(cmds.into_iter().map(|c| c.map_with(f)).collect()),
            Self::Log(s) => Cmd::Log(s),
            Self::Task(spec, task) => {
                let f = Arc::clone(f);
                Cmd::Task(spec, Box::new(move || f(task())))
            }
        }
    }

    /// Stable name for tracing.
    #[inline]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Quit => "Quit",
            Self::Batch(_) => "Batch",
            Self::Log(_) => "Log",
            Self::Task(..) => "Task",
        }
    }
}

/// Program configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramConfig {
    /// How long the loop waits for a message before checking subscriptions
    /// and finished tasks.
    pub poll_timeout: Duration,
    /// Write the view after each batch of updates.
    pub render: bool,
}

impl Default for ProgramConfig {
    fn default() -> Self {
        Self {
            poll_timeout: Duration::from_millis(50),
            render: true,
        }
    }
}

impl ProgramConfig {
    /// A program that never writes its view (logs still go out).
    #[must_use]
    pub fn quiet() -> Self {
        Self {
            render: false,
            ..Self::default()
        }
    }
}

/// The runtime loop.
pub struct Program<M: Model, W: Write = io::Stdout> {
    model: M,
    writer: W,
    config: ProgramConfig,
    running: bool,
    dirty: bool,
    last_view: Option<String>,
    sender: mpsc::Sender<M::Message>,
    receiver: mpsc::Receiver<M::Message>,
    task_handles: Vec<JoinHandle<()>>,
    subscriptions: SubscriptionManager<M::Message>,
}

impl<M: Model> Program<M, io::Stdout> {
    /// A program writing to stdout.
    pub fn new(model: M, config: ProgramConfig) -> Self {
        Self::with_writer(model, io::stdout(), config)
    }
}

impl<M: Model, W: Write> Program<M, W> {
    pub fn with_writer(model: M, writer: W, config: ProgramConfig) -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            model,
            writer,
            config,
            running: true,
            dirty: true,
            last_view: None,
            sender,
            receiver,
            task_handles: Vec::new(),
            subscriptions: SubscriptionManager::new(),
        }
    }

    /// A handle for feeding external input (keyboard, stdin commands) into
    /// the loop. Messages sent after the program stopped are dropped.
    #[must_use]
    pub fn sender(&self) -> mpsc::Sender<M::Message> {
        self.sender.clone()
    }

    /// Run until a [`Cmd::Quit`].
    pub fn run(&mut self) -> io::Result<()> {
        let cmd = {
            let _span = info_span!("dockview.program.init").entered();
            self.model.init()
        };
        self.execute_cmd(cmd)?;
        self.reconcile_subscriptions();
        self.render()?;

        while self.running {
            match self.receiver.recv_timeout(self.config.poll_timeout) {
                Ok(msg) => {
                    self.dispatch(msg, "input")?;
                    while self.running {
                        let Ok(msg) = self.receiver.try_recv() else {
                            break;
                        };
                        self.dispatch(msg, "input")?;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                // Unreachable while `self.sender` lives, kept for completeness.
                Err(RecvTimeoutError::Disconnected) => self.running = false,
            }

            self.process_subscription_messages()?;
            self.reap_finished_tasks();

            if self.dirty {
                self.reconcile_subscriptions();
                self.render()?;
            }
        }

        self.subscriptions.stop_all();
        debug!(pending_tasks = self.task_handles.len(), "program stopped");
        Ok(())
    }

    fn dispatch(&mut self, msg: M::Message, source: &'static str) -> io::Result<()> {
        let cmd = {
            let _span = debug_span!(
                "dockview.program.update",
                msg_source = source,
                duration_us = tracing::field::Empty,
                cmd_type = tracing::field::Empty
            )
            .entered();
            let start = Instant::now();
            let cmd = self.model.update(msg);
            let elapsed_us = u64::try_from(start.elapsed().as_micros()).unwrap_or(u64::MAX);
            tracing::Span::current().record("duration_us", elapsed_us);
            tracing::Span::current().record("cmd_type", cmd.type_name());
            cmd
        };
        self.dirty = true;
        self.execute_cmd(cmd)
    }

    /// Reconcile the model's declared subscriptions with running ones.
    fn reconcile_subscriptions(&mut self) {
        let before = self.subscriptions.active_count();
        self.subscriptions.reconcile(self.model.subscriptions());
        let after = self.subscriptions.active_count();
        tracing::trace!(active_before = before, active_after = after, "subscriptions reconciled");
    }

    fn process_subscription_messages(&mut self) -> io::Result<()> {
        for msg in self.subscriptions.drain_messages() {
            if !self.running {
                break;
            }
            self.dispatch(msg, "subscription")?;
        }
        Ok(())
    }

    fn execute_cmd(&mut self, cmd: Cmd<M::Message>) -> io::Result<()> {
        match cmd {
            Cmd::None => {}
            Cmd::Quit => self.running = false,
            Cmd::Batch(cmds) => {
                for c in cmds {
                    self.execute_cmd(c)?;
                    if !self.running {
                        break;
                    }
                }
            }
            Cmd::Log(text) => {
                let line = text.trim_end_matches('\n');
                writeln!(self.writer, "{line}")?;
                self.writer.flush()?;
            }
            Cmd::Task(spec, f) => {
                let sender = self.sender.clone();
                let name = spec.name.clone().unwrap_or_else(|| "task".to_string());
                tracing::trace!(task = %name, "spawning task");
                let handle = std::thread::Builder::new()
                    .name(format!("dockview-{name}"))
                    .spawn(move || {
                        let msg = f();
                        let _ = sender.send(msg);
                    })?;
                self.task_handles.push(handle);
            }
        }
        Ok(())
    }

    fn reap_finished_tasks(&mut self) {
        if self.task_handles.is_empty() {
            return;
        }

        let mut remaining = Vec::with_capacity(self.task_handles.len());
        for handle in self.task_handles.drain(..) {
            if !handle.is_finished() {
                remaining.push(handle);
                continue;
            }
            if let Err(payload) = handle.join() {
                let msg = if let Some(s) = payload.downcast_ref::<&str>() {
                    (*s).to_owned()
                } else if let Some(s) = payload.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "unknown panic payload".to_owned()
                };
                tracing::error!("spawned task panicked: {msg}");
            }
        }
        self.task_handles = remaining;
    }

    fn render(&mut self) -> io::Result<()> {
        self.dirty = false;
        if !self.config.render {
            return Ok(());
        }
        let view = self.model.view();
        if self.last_view.as_deref() == Some(view.as_str()) {
            return Ok(());
        }
        if !view.is_empty() {
            writeln!(self.writer, "{view}")?;
            self.writer.flush()?;
        }
        self.last_view = Some(view);
        Ok(())
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Request shutdown at the end of the current loop iteration.
    pub fn quit(&mut self) {
        self.running = false;
    }

    /// Consume the program and return its writer.
    pub fn into_writer(self) -> W {
        self.writer
    }
}
