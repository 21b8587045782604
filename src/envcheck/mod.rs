//! Environment verification for an AI development container.
//!
//! Checks the Python interpreter, GPU drivers and CUDA, TensorFlow GPU
//! support, sixteen AI/ML packages and nine developer tools, then lists a few
//! environment variables for information. Five categories count toward the
//! result; the run succeeds only when all five pass.
//!
//! ```no_run
//! use doc_analyzer::envcheck::{run_all, SystemRunner};
//!
//! let report = run_all(&SystemRunner, "python3", |_| {});
//! print!("{}", report.render_text());
//! std::process::exit(report.exit_code());
//! ```

pub mod checks;
pub mod report;
pub mod runner;

pub use report::{Category, Line, Report, Status};
pub use runner::{CommandOutput, CommandRunner, CommandError, SystemRunner};

use tracing::debug;

/// Run every check in order. `on_progress` receives each category title
/// before it runs.
pub fn run_all(
    runner: &dyn CommandRunner,
    python: &str,
    mut on_progress: impl FnMut(&str),
) -> Report {
    let mut categories = Vec::with_capacity(5);

    on_progress("Python version");
    categories.push(checks::check_python_version(runner, python));
    on_progress("CUDA");
    categories.push(checks::check_cuda(runner, python));
    on_progress("TensorFlow GPU");
    categories.push(checks::check_tensorflow_gpu(runner, python));
    on_progress("AI/ML packages");
    categories.push(checks::check_packages(runner, python));
    on_progress("developer tools");
    categories.push(checks::check_tools(runner));

    for c in &categories {
        debug!(category = c.title, passed = c.passed, "check finished");
    }

    on_progress("environment variables");
    let environment = checks::check_environment(runner);

    Report::new(categories, environment)
}
