//! UI context for detecting interactive vs CI environments

use std::io::IsTerminal;

/// CI systems that do not set `CI` themselves
const CI_VARS: &[&str] = &[
    "CI",
    "GITHUB_ACTIONS",
    "GITLAB_CI",
    "CIRCLECI",
    "JENKINS_URL",
    "BUILDKITE",
    "TF_BUILD",
];

/// UI context that determines output behavior
#[derive(Debug, Clone, Copy)]
pub struct UiContext {
    interactive: bool,
}

impl UiContext {
    /// Detect the current environment
    pub fn detect() -> Self {
        Self {
            interactive: std::io::stdout().is_terminal() && !in_ci(),
        }
    }

    /// Create a non-interactive context (for testing or piped output)
    pub fn non_interactive() -> Self {
        Self { interactive: false }
    }

    /// Check if we're in an interactive terminal
    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    /// Check if we should use fancy output (cliclack frames, bold headers)
    pub fn use_fancy_output(&self) -> bool {
        self.interactive
    }
}

fn in_ci() -> bool {
    CI_VARS.iter().any(|var| std::env::var_os(var).is_some())
}
