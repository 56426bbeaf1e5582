//! Terminal output and prompts.

mod output;
mod prompts;

pub use output::*;
pub use prompts::*;
