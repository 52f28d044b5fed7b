#![forbid(unsafe_code)]

//! Deterministic program simulator for testing.
//!
//! `ProgramSimulator` runs a [`Model`] on the test thread. Background tasks
//! either run inline as soon as they are issued ([`TaskMode::Immediate`]) or
//! are parked until the test releases them ([`TaskMode::Deferred`]), which
//! makes in-flight states and out-of-order completions reproducible.
//! Subscriptions are never started; the simulator records which ids the
//! model declares after each update so tests can assert on them.
//!
//! # Example
//!
//! ```ignore
//! use dockview_runtime::simulator::{ProgramSimulator, TaskMode};
//!
//! let mut sim = ProgramSimulator::new(dialog).with_task_mode(TaskMode::Deferred);
//! sim.init();
//! sim.send(DialogMsg::Open("api".into()));
//! assert_eq!(sim.pending_tasks(), 1);
//! sim.run_next_task();
//! ```

use std::collections::VecDeque;

use crate::program::{Cmd, Model, TaskSpec};
use crate::subscription::SubId;

/// Record of a command that was executed during simulation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CmdRecord {
    None,
    Quit,
    Batch(usize),
    Log(String),
    /// Background task issued, with its name if any.
    Task(Option<String>),
}

/// When background tasks run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TaskMode {
    /// Run inline, delivering the result before `send` returns.
    #[default]
    Immediate,
    /// Queue until [`ProgramSimulator::run_next_task`] or
    /// [`ProgramSimulator::run_task_at`].
    Deferred,
}

type PendingTask<M> = (TaskSpec, Box<dyn FnOnce() -> M + Send>);

/// Deterministic simulator for [`Model`] testing.
pub struct ProgramSimulator<M: Model> {
    model: M,
    mode: TaskMode,
    pending: VecDeque<PendingTask<M::Message>>,
    command_log: Vec<CmdRecord>,
    running: bool,
    logs: Vec<String>,
    subscriptions: Vec<SubId>,
}

impl<M: Model> ProgramSimulator<M> {
    /// The model is not initialized until [`init`](Self::init) is called.
    pub fn new(model: M) -> Self {
        Self {
            model,
            mode: TaskMode::Immediate,
            pending: VecDeque::new(),
            command_log: Vec::new(),
            running: true,
            logs: Vec::new(),
            subscriptions: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_task_mode(mut self, mode: TaskMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn init(&mut self) {
        let cmd = self.model.init();
        self.execute_cmd(cmd);
        self.refresh_subscriptions();
    }

    /// Dispatch a message through `Model::update` and execute the result.
    pub fn send(&mut self, msg: M::Message) {
        if !self.running {
            return;
        }
        let cmd = self.model.update(msg);
        self.execute_cmd(cmd);
        self.refresh_subscriptions();
    }

    /// Run the oldest parked task and deliver its result.
    ///
    /// Returns `false` when nothing was pending.
    pub fn run_next_task(&mut self) -> bool {
        self.run_task_at(0)
    }

    /// Run the parked task at `index` (0 = oldest), letting tests complete
    /// tasks out of order.
    pub fn run_task_at(&mut self, index: usize) -> bool {
        let Some((_, f)) = self.pending.remove(index) else {
            return false;
        };
        let msg = f();
        self.send(msg);
        true
    }

    /// Run parked tasks, including ones issued while running, until none
    /// remain. Returns how many ran.
    pub fn run_all_tasks(&mut self) -> usize {
        let mut ran = 0;
        while self.run_next_task() {
            ran += 1;
        }
        ran
    }

    /// Drop all parked tasks without running them.
    pub fn drop_pending_tasks(&mut self) -> usize {
        let count = self.pending.len();
        self.pending.clear();
        count
    }

    pub fn pending_tasks(&self) -> usize {
        self.pending.len()
    }

    /// Names of the parked tasks, oldest first.
    pub fn pending_task_names(&self) -> Vec<Option<&str>> {
        self.pending
            .iter()
            .map(|(spec, _)| spec.name.as_deref())
            .collect()
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }

    /// Render the model's text view.
    pub fn view(&self) -> String {
        self.model.view()
    }

    /// `false` after a `Cmd::Quit` has been executed.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Lines emitted via `Cmd::Log`.
    pub fn logs(&self) -> &[String] {
        &self.logs
    }

    pub fn command_log(&self) -> &[CmdRecord] {
        &self.command_log
    }

    /// Subscription ids the model declared after the last update.
    pub fn active_subscriptions(&self) -> &[SubId] {
        &self.subscriptions
    }

    pub fn clear_logs(&mut self) {
        self.logs.clear();
    }

    fn refresh_subscriptions(&mut self) {
        let mut ids: Vec<SubId> = self.model.subscriptions().iter().map(|s| s.id()).collect();
        ids.sort_unstable();
        ids.dedup();
        self.subscriptions = ids;
    }

    fn execute_cmd(&mut self, cmd: Cmd<M::Message>) {
        match cmd {
            Cmd::None => self.command_log.push(CmdRecord::None),
            Cmd::Quit => {
                self.running = false;
                self.command_log.push(CmdRecord::Quit);
            }
            Cmd::Batch(cmds) => {
                self.command_log.push(CmdRecord::Batch(cmds.len()));
                self.execute_all(cmds);
            }
            Cmd::Log(text) => {
                self.command_log.push(CmdRecord::Log(text.clone()));
                self.logs.push(text);
            }
            Cmd::Task(spec, f) => {
                self.command_log.push(CmdRecord::Task(spec.name.clone()));
                match self.mode {
                    TaskMode::Immediate => {
                        let msg = f();
                        let cmd = self.model.update(msg);
                        self.execute_cmd(cmd);
                    }
                    TaskMode::Deferred => self.pending.push_back((spec, f)),
                }
            }
        }
    }

    fn execute_all(&mut self, cmds: Vec<Cmd<M::Message>>) {
        for c in cmds {
            self.execute_cmd(c);
            if !self.running {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscription::{Every, Subscription};
    use std::time::Duration;

    #[derive(Debug)]
    enum Msg {
        Fetch(u32),
        Fetched(u32),
        Watch(bool),
        Quit,
    }

    #[derive(Default)]
    struct Fetcher {
        results: Vec<u32>,
        watching: bool,
    }

    impl Model for Fetcher {
        type Message = Msg;

        fn update(&mut self, msg: Msg) -> Cmd<Msg> {
            match msg {
                Msg::Fetch(n) => Cmd::task_named(format!("fetch-{n}"), move || Msg::Fetched(n)),
                Msg::Fetched(n) => {
                    self.results.push(n);
                    Cmd::log(format!("fetched {n}"))
                }
                Msg::Watch(on) => {
                    self.watching = on;
                    Cmd::none()
                }
                Msg::Quit => Cmd::quit(),
            }
        }

        fn view(&self) -> String {
            format!("{:?}", self.results)
        }

        fn subscriptions(&self) -> Vec<Box<dyn Subscription<Msg>>> {
            if self.watching {
                vec![Box::new(Every::with_id(3, Duration::from_secs(1), || Msg::Fetch(0)))]
            } else {
                vec![]
            }
        }
    }

    #[test]
    fn immediate_tasks_complete_inline() {
        let mut sim = ProgramSimulator::new(Fetcher::default());
        sim.init();
        sim.send(Msg::Fetch(1));
        assert_eq!(sim.model().results, vec![1]);
        assert_eq!(sim.logs(), ["fetched 1".to_string()]);
        assert!(sim.command_log().contains(&CmdRecord::Task(Some("fetch-1".into()))));
    }

    #[test]
    fn deferred_tasks_run_in_any_order() {
        let mut sim = ProgramSimulator::new(Fetcher::default()).with_task_mode(TaskMode::Deferred);
        sim.init();
        sim.send(Msg::Fetch(1));
        sim.send(Msg::Fetch(2));
        sim.send(Msg::Fetch(3));
        assert_eq!(sim.pending_tasks(), 3);
        assert_eq!(
            sim.pending_task_names(),
            vec![Some("fetch-1"), Some("fetch-2"), Some("fetch-3")]
        );

        assert!(sim.run_task_at(1));
        assert_eq!(sim.model().results, vec![2]);
        assert_eq!(sim.run_all_tasks(), 2);
        assert_eq!(sim.model().results, vec![2, 1, 3]);
        assert!(!sim.run_next_task());
    }

    #[test]
    fn dropped_tasks_never_deliver() {
        let mut sim = ProgramSimulator::new(Fetcher::default()).with_task_mode(TaskMode::Deferred);
        sim.send(Msg::Fetch(9));
        assert_eq!(sim.drop_pending_tasks(), 1);
        assert!(sim.model().results.is_empty());
    }

    #[test]
    fn tracks_declared_subscriptions() {
        let mut sim = ProgramSimulator::new(Fetcher::default());
        sim.init();
        assert!(sim.active_subscriptions().is_empty());
        sim.send(Msg::Watch(true));
        assert_eq!(sim.active_subscriptions(), [3]);
        sim.send(Msg::Watch(false));
        assert!(sim.active_subscriptions().is_empty());
    }

    #[test]
    fn quit_stops_processing() {
        let mut sim = ProgramSimulator::new(Fetcher::default());
        sim.send(Msg::Quit);
        assert!(!sim.is_running());
        sim.send(Msg::Fetch(1));
        assert!(sim.model().results.is_empty());
        assert_eq!(sim.view(), "[]");
    }
}
