#![forbid(unsafe_code)]

use std::process::ExitCode;

use dockview_admin::cli::Opts;
use dockview_admin::{logging, runner};

fn main() -> ExitCode {
    let opts = Opts::parse();
    if let Err(err) = logging::init_subscriber(opts.verbosity, opts.log_format) {
        eprintln!("dockview: failed to install log subscriber: {err}");
    }

    match runner::run(&opts) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "dockview exited with an error");
            eprintln!("dockview: {err}");
            ExitCode::FAILURE
        }
    }
}
