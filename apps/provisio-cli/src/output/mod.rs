//! Terminal output helpers

mod github;
mod printer;
pub mod report;

pub use github::GithubOutput;
pub use printer::{print_warning, Printer};
