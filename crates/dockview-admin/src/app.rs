#![forbid(unsafe_code)]

//! The composed admin app: status board plus log dialog, driven by
//! line commands.

use std::fmt;

use dockview_core::LogLevel;
use dockview_runtime::{Cmd, Every, Model, Subscription};

use crate::dialog::{DialogMsg, LogDialog};
use crate::status_board::{BoardMsg, STATUS_POLL_ID, StatusBoard};

#[derive(Debug)]
pub enum AppMsg {
    Board(BoardMsg),
    Dialog(DialogMsg),
    /// A raw command line from the user.
    Command(String),
    Quit,
}

/// A parsed command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Open logs by container name, display name, or board position.
    Open(String),
    Close,
    Refresh,
    Scroll(u32),
    Up(u32),
    Down(u32),
    Top,
    Bottom,
    Level(LogLevel),
    LevelsReset,
    Resize { width: u32, height: u32 },
    Status,
    HideStatus,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandError(pub String);

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for CommandError {}

pub const HELP: &str = "\
commands:
  open <name|n>     show logs of a container
  close             close the log dialog
  refresh           reload the newest page and the status board
  scroll <y>        scroll the log list to offset y (0 loads older logs)
  up [n] / down [n] scroll by n rows
  top / bottom      jump to the oldest loaded / newest log
  level <name>      toggle a level (error, warn, info, debug, undefined)
  levels reset      select every level
  resize <w> <h>    set the dialog size
  status / hide     show or hide the status board
  quit";

fn parse_u32(value: Option<&str>, what: &str) -> Result<u32, CommandError> {
    let value = value.ok_or_else(|| CommandError(format!("missing {what}")))?;
    value
        .parse()
        .map_err(|_| CommandError(format!("invalid {what}: {value}")))
}

fn parse_level(label: &str) -> Result<LogLevel, CommandError> {
    let level = LogLevel::from_label(label);
    if level == LogLevel::Undefined && !label.eq_ignore_ascii_case("undefined") {
        return Err(CommandError(format!("unknown level: {label}")));
    }
    Ok(level)
}

/// Parse one command line.
pub fn parse_command(line: &str) -> Result<Command, CommandError> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Err(CommandError("empty command".into()));
    };
    let arg = words.next();
    let command = match verb {
        "open" | "logs" => Command::Open(
            arg.ok_or_else(|| CommandError("missing container".into()))?
                .to_string(),
        ),
        "close" => Command::Close,
        "refresh" | "r" => Command::Refresh,
        "scroll" => Command::Scroll(parse_u32(arg, "offset")?),
        "up" => Command::Up(arg.map_or(Ok(1), |a| parse_u32(Some(a), "count"))?),
        "down" => Command::Down(arg.map_or(Ok(1), |a| parse_u32(Some(a), "count"))?),
        "top" => Command::Top,
        "bottom" => Command::Bottom,
        "level" => Command::Level(parse_level(
            arg.ok_or_else(|| CommandError("missing level".into()))?,
        )?),
        "levels" if arg == Some("reset") => Command::LevelsReset,
        "resize" => Command::Resize {
            width: parse_u32(arg, "width")?,
            height: parse_u32(words.next(), "height")?,
        },
        "status" => Command::Status,
        "hide" => Command::HideStatus,
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        other => return Err(CommandError(format!("unknown command: {other}"))),
    };
    Ok(command)
}

pub struct AppModel {
    board: StatusBoard,
    dialog: LogDialog,
    show_board_on_start: bool,
}

impl AppModel {
    pub fn new(board: StatusBoard, dialog: LogDialog) -> Self {
        Self {
            board,
            dialog,
            show_board_on_start: true,
        }
    }

    /// Start with the board hidden (single-container mode).
    #[must_use]
    pub fn without_board(mut self) -> Self {
        self.show_board_on_start = false;
        self
    }

    pub fn board(&self) -> &StatusBoard {
        &self.board
    }

    pub fn dialog(&self) -> &LogDialog {
        &self.dialog
    }

    fn board_update(&mut self, msg: BoardMsg) -> Cmd<AppMsg> {
        self.board.update(msg).map(AppMsg::Board)
    }

    fn dialog_update(&mut self, msg: DialogMsg) -> Cmd<AppMsg> {
        self.dialog.update(msg).map(AppMsg::Dialog)
    }

    fn run_command(&mut self, command: Command) -> Cmd<AppMsg> {
        match command {
            Command::Open(key) => {
                let name = self
                    .board
                    .resolve(&key)
                    .map_or(key, |container| container.name.clone());
                self.dialog_update(DialogMsg::Open(name))
            }
            Command::Close => self.dialog_update(DialogMsg::Close),
            Command::Refresh => Cmd::batch(vec![
                self.dialog_update(DialogMsg::Refresh),
                self.board_update(BoardMsg::Poll),
            ]),
            Command::Scroll(y) => self.dialog_update(DialogMsg::Scrolled(y)),
            Command::Up(n) => self.dialog_update(DialogMsg::ScrollBy(-i64::from(n))),
            Command::Down(n) => self.dialog_update(DialogMsg::ScrollBy(i64::from(n))),
            Command::Top => self.dialog_update(DialogMsg::ScrollToTop),
            Command::Bottom => self.dialog_update(DialogMsg::ScrollToBottom),
            Command::Level(level) => self.dialog_update(DialogMsg::ToggleLevel(level)),
            Command::LevelsReset => self.dialog_update(DialogMsg::ResetLevels),
            Command::Resize { width, height } => {
                self.dialog_update(DialogMsg::Resized { width, height })
            }
            Command::Status => self.board_update(BoardMsg::Show),
            Command::HideStatus => self.board_update(BoardMsg::Hide),
            Command::Help => Cmd::log(HELP),
            Command::Quit => Cmd::quit(),
        }
    }
}

impl Model for AppModel {
    type Message = AppMsg;

    fn init(&mut self) -> Cmd<AppMsg> {
        if self.show_board_on_start {
            self.board_update(BoardMsg::Show)
        } else {
            Cmd::none()
        }
    }

    fn update(&mut self, msg: AppMsg) -> Cmd<AppMsg> {
        match msg {
            AppMsg::Board(msg) => self.board_update(msg),
            AppMsg::Dialog(msg) => self.dialog_update(msg),
            AppMsg::Command(line) => match parse_command(&line) {
                Ok(command) => self.run_command(command),
                Err(err) => Cmd::log(format!("{err} (try `help`)")),
            },
            AppMsg::Quit => Cmd::quit(),
        }
    }

    fn view(&self) -> String {
        let board = self.board.view();
        let dialog = self.dialog.view();
        match (board.is_empty(), dialog.is_empty()) {
            (false, false) => format!("{board}\n\n{dialog}"),
            (false, true) => board,
            _ => dialog,
        }
    }

    fn subscriptions(&self) -> Vec<Box<dyn Subscription<AppMsg>>> {
        if self.board.is_open() {
            vec![Box::new(Every::with_id(
                STATUS_POLL_ID,
                self.board.interval(),
                || AppMsg::Board(BoardMsg::Poll),
            ))]
        } else {
            vec![]
        }
    }
}
