//! Progress-bar construction, carried directly from the teacher's
//! `utils.rs` (`new_spinner`, `new_progress_bar`, `new_progress_bar_bytes`,
//! `new_spinner_totals`): same `indicatif` templates, trimmed of the
//! taxonomy-specific string/enum helpers (`titleize_first_word`,
//! `str_to_taxonomic_rank`, and friends) that have no counterpart in this
//! crate's domain.

use indicatif::{ProgressBar, ProgressStyle};

pub static PROGRESS_TEMPLATE: &str = "[{elapsed_precise}] {bar:40.cyan/blue} {human_pos:>7}/{human_len:7} {msg}";
pub static SPINNER_TEMPLATE: &str = "[{elapsed_precise}] {spinner:2.cyan/blue} {msg}";
pub static SPINNER_TOTALS_TEMPLATE: &str = "{spinner:2.cyan/blue} {msg}: {human_pos}";
pub static BYTES_PROGRESS_TEMPLATE: &str = "[{elapsed_precise}] {bar:40.cyan/blue} {decimal_bytes:>7}/{decimal_total_bytes:7} @ {decimal_bytes_per_sec} [eta: {eta}] {msg}";

pub fn new_spinner(message: &str) -> ProgressBar {
    let style = ProgressStyle::with_template(SPINNER_TEMPLATE).expect("invalid spinner template");
    ProgressBar::new_spinner().with_message(message.to_string()).with_style(style)
}

pub fn new_progress_bar(total: usize, message: &str) -> ProgressBar {
    let style = ProgressStyle::with_template(PROGRESS_TEMPLATE).expect("invalid progress bar template");
    ProgressBar::new(total as u64).with_message(message.to_string()).with_style(style)
}

pub fn new_progress_bar_bytes(total: usize, message: &str) -> ProgressBar {
    let style = ProgressStyle::with_template(BYTES_PROGRESS_TEMPLATE).expect("invalid progress bar template");
    ProgressBar::new(total as u64).with_message(message.to_string()).with_style(style)
}

pub fn new_spinner_totals(message: &str) -> ProgressBar {
    let style = ProgressStyle::with_template(SPINNER_TOTALS_TEMPLATE).expect("invalid spinner template");
    ProgressBar::new_spinner().with_message(message.to_string()).with_style(style)
}
