//! Terminal output helpers
//!
//! Uses `cliclack` for styled output in interactive terminals, with a plain
//! fallback for pipes and CI so command output stays parseable.

mod context;
mod output;

pub use context::UiContext;
pub use output::{intro, remark, step_error, step_info, step_ok, step_warn, Table};
