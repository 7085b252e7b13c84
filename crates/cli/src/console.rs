//! Console rendering: the colored display sink and the interactive
//! plan-selection prompt.

use colored::Colorize;
use dialoguer::Select;
use std::io::Write;
use taskhelm_agent::PlanPicker;
use taskhelm_core::display::DisplaySink;

pub struct ConsoleSink;

impl DisplaySink for ConsoleSink {
    fn fragment(&self, text: &str) {
        print!("{text}");
        let _ = std::io::stdout().flush();
    }

    fn line(&self, text: &str) {
        println!("{text}");
    }

    fn panel(&self, header: &str, body: &str) {
        let rule = "─".repeat(panel_width(header, body) + 2);
        println!("{}", format!("┌{rule}┐").bright_black());
        println!("{} {}", "│".bright_black(), header.cyan().bold());
        println!("{}", format!("├{rule}┤").bright_black());
        for line in body.lines() {
            println!("{} {line}", "│".bright_black());
        }
        println!("{}", format!("└{rule}┘").bright_black());
    }

    fn dim(&self, text: &str) {
        println!("{}", text.bright_black());
    }
}

/// Border width in characters, not bytes, so non-ASCII plan text sizes
/// correctly.
fn panel_width(header: &str, body: &str) -> usize {
    header
        .chars()
        .count()
        .max(body.lines().map(|l| l.chars().count()).max().unwrap_or(0))
        .min(76)
}

/// Arrow-key selection among saved plan paths. Esc aborts the pick.
pub struct DialoguerPicker;

impl PlanPicker for DialoguerPicker {
    fn pick(&self, paths: &[String]) -> Option<String> {
        let selection = Select::new()
            .with_prompt("Select a plan")
            .items(paths)
            .default(0)
            .interact_opt()
            .ok()
            .flatten()?;
        paths.get(selection).cloned()
    }
}
