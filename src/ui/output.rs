//! Output functions for consistent CLI formatting

use super::context::UiContext;
use console::style;

/// Display intro banner
pub fn intro(ctx: &UiContext, title: &str) {
    if ctx.use_fancy_output() {
        cliclack::intro(style(title).cyan().bold()).ok();
    } else {
        println!("{}", style(title).cyan().bold());
        println!();
    }
}

/// Display a success step, with optional detail such as a file path
pub fn step_ok(ctx: &UiContext, message: &str, detail: Option<&str>) {
    let text = match detail {
        Some(detail) if ctx.use_fancy_output() => format!("{} ({})", message, style(detail).dim()),
        Some(detail) => format!("{} ({})", message, detail),
        None => message.to_string(),
    };

    if ctx.use_fancy_output() {
        cliclack::log::success(text).ok();
    } else {
        println!("  {} {}", style("[OK]").green(), text);
    }
}

/// Display a warning with a follow-up hint
pub fn step_warn(ctx: &UiContext, message: &str, hint: &str) {
    if ctx.use_fancy_output() {
        cliclack::log::warning(format!("{} - {}", message, style(hint).dim())).ok();
    } else {
        println!("  {} {} - {}", style("[WARN]").yellow(), message, hint);
    }
}

/// Display a failed step on stderr
pub fn step_error(ctx: &UiContext, message: &str, detail: &str) {
    if ctx.use_fancy_output() {
        cliclack::log::error(format!("{}: {}", message, style(detail).red())).ok();
    } else {
        eprintln!("  {} {}: {}", style("[FAIL]").red(), message, detail);
    }
}

/// Display an info step
pub fn step_info(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        cliclack::log::info(message).ok();
    } else {
        println!("  {} {}", style("[INFO]").cyan(), message);
    }
}

/// Display a remark/hint
pub fn remark(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        cliclack::log::remark(message).ok();
    } else {
        println!("  {}", style(message).dim());
    }
}

/// Fixed-width text table
#[derive(Debug)]
pub struct Table {
    widths: Vec<usize>,
    headers: Vec<&'static str>,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// Columns as `(header, width)` pairs
    pub fn new(columns: &[(&'static str, usize)]) -> Self {
        Self {
            widths: columns.iter().map(|(_, w)| *w).collect(),
            headers: columns.iter().map(|(h, _)| *h).collect(),
            rows: Vec::new(),
        }
    }

    pub fn row(&mut self, cells: Vec<String>) {
        self.rows.push(cells);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Render header, rule, and rows
    pub fn render(&self, ctx: &UiContext) -> String {
        let header: Vec<String> = self.headers.iter().map(|h| h.to_string()).collect();
        let header = self.line(&header);
        let rule = "-".repeat(self.widths.iter().sum::<usize>() + self.widths.len().saturating_sub(1));

        let mut out = Vec::with_capacity(self.rows.len() + 2);
        if ctx.use_fancy_output() {
            out.push(style(header).bold().to_string());
        } else {
            out.push(header);
        }
        out.push(rule);
        out.extend(self.rows.iter().map(|row| self.line(row)));
        out.join("\n")
    }

    pub fn print(&self, ctx: &UiContext) {
        println!("{}", self.render(ctx));
    }

    fn line(&self, cells: &[String]) -> String {
        cells
            .iter()
            .zip(&self.widths)
            .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
            .collect::<Vec<_>>()
            .join(" ")
            .trim_end()
            .to_string()
    }
}
