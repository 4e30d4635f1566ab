use marginalia_core::Augmented;
use marginalia_core::metadata::EntryState;
use owo_colors::OwoColorize;

use crate::VERSION;

/// Print a styled banner for verbose mode
pub fn print_banner() {
    eprintln!("\n{} {} {}", "Marginalia".bold().bright_blue(), "v".dimmed(), VERSION.dimmed());
    eprintln!("{}", "Augment rendered static-site pages\n".dimmed());
}

/// Print a styled step message
pub fn print_step(step: usize, total: usize, message: &str) {
    eprintln!("{} {}", format!("[{}/{}]", step, total).dimmed(), message.bright_cyan());
}

/// Print a success message
pub fn print_success(message: &str) {
    eprintln!("{} {}", "✓".green(), message.bright_green());
}

/// Print an info message
pub fn print_info(message: &str) {
    eprintln!("{} {}", "ℹ".blue(), message.bright_blue());
}

/// Print a warning message
pub fn print_warning(message: &str) {
    eprintln!("{} {}", "⚠".yellow(), message.bright_yellow());
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red(), message.bright_red());
}

/// Print a labelled value under the current step
pub fn print_detail(label: &str, value: &str) {
    eprintln!("  {} {}", format!("{}:", label).dimmed(), value.bright_white());
}

/// Print what each step produced
pub fn print_summary(augmented: &Augmented) {
    eprintln!("\n{}", "═".repeat(60).dimmed());
    eprintln!("{}", "Augmentation Summary".bold().cyan());
    eprintln!("{}", "═".repeat(60).dimmed());

    let headings: usize = augmented.toc.iter().map(count_nodes).sum();
    print_detail("Headings", &headings.to_string());

    match &augmented.reading {
        Some(stats) => print_detail(
            "Reading time",
            &format!("{} min ({} words at {} wpm)", stats.estimated_minutes, stats.word_count, stats.words_per_minute),
        ),
        None => print_detail("Reading time", "no container"),
    }

    let failed = augmented.metadata.iter().filter(|e| matches!(e.state, EntryState::Failed { .. })).count();
    print_detail(
        "Metadata",
        &format!("{} resolved, {} failed", augmented.metadata.len() - failed, failed),
    );
    for entry in &augmented.metadata {
        if let Some(failure) = entry.failure() {
            eprintln!("    {} {} {}", "✗".red(), entry.key.to_string().dimmed(), failure.to_string().bright_red());
        }
    }

    if !augmented.scroll.active.is_empty() {
        let active: Vec<&str> = augmented.scroll.active.iter().map(String::as_str).collect();
        print_detail("Scroll thresholds", &active.join(", "));
    }

    let open: Vec<&str> =
        augmented.toggles.iter().filter(|(_, state)| state.is_open()).map(|(id, _)| id.as_str()).collect();
    print_detail("Toggles", &format!("{} ({} open)", augmented.toggles.len(), open.len()));
    eprintln!();
}

fn count_nodes(node: &marginalia_core::HeadingNode) -> usize {
    1 + node.children.iter().map(count_nodes).sum::<usize>()
}

/// Format file size for display
pub fn format_size(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = 1024 * KB;

    if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
