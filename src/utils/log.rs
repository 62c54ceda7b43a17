// src/utils/log.rs

//! Structured progress output on top of the `log` facade.
//!
//! The binary installs `env_logger`; these helpers only shape messages so
//! a run reads as a sequence of headed steps and a closing summary.

/// Width of separator lines.
const RULE_WIDTH: usize = 60;

/// Log a header.
pub fn header(title: &str) {
    let border = "═".repeat(RULE_WIDTH);
    log::info!("{}", border);
    log::info!("  {}", title);
    log::info!("{}", border);
}

/// Log a separator line.
pub fn separator() {
    log::info!("{}", "─".repeat(RULE_WIDTH));
}

/// Log a step in a process.
pub fn step(step_num: usize, total: usize, message: &str) {
    log::info!("{}", format_step(step_num, total, message));
}

/// Log a sub-item (indented).
pub fn sub_item(message: &str) {
    log::info!("    {}", message);
}

/// Log a summary section.
pub fn summary(title: &str, items: &[(&str, String)]) {
    log::info!("[SUMMARY] {}", title);
    for (key, value) in items {
        log::info!("    {}: {}", key, value);
    }
}

fn format_step(step_num: usize, total: usize, message: &str) -> String {
    format!("[STEP {}/{}] {}", step_num, total, message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_step() {
        assert_eq!(
            format_step(2, 5, "resolving listing"),
            "[STEP 2/5] resolving listing"
        );
    }
}
