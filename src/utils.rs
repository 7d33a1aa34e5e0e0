use chrono::{Local, TimeZone};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

pub const LOG_FILE: &str = "bookdiff.log";

static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

/// `<prefix>-<millis>-<counter>`, both in base 36. The counter is shared by
/// the whole process, so two calls never return the same id.
pub fn generate_id(prefix: &str) -> String {
    let counter = ID_COUNTER.fetch_add(1, Ordering::Relaxed) + 1;
    let millis = Local::now().timestamp_millis().max(0) as u64;
    format!("{}-{}-{}", prefix, to_base36(millis), to_base36(counter))
}

/// Milliseconds since the epoch, shown as local time.
pub fn format_timestamp(millis: Option<i64>) -> String {
    match millis.and_then(|ms| Local.timestamp_millis_opt(ms).single()) {
        Some(time) => {
            if time.format("%Y").to_string() == Local::now().format("%Y").to_string() {
                time.format("%b %e %H:%M").to_string()
            } else {
                time.format("%b %e  %Y").to_string()
            }
        }
        None => "           ".to_string(),
    }
}

pub fn truncate_path(path: &str, max_width: usize) -> String {
    let chars: Vec<char> = path.chars().collect();
    if chars.len() <= max_width {
        return path.to_string();
    }

    if max_width < 3 {
        return "...".to_string();
    }

    let start_len = (max_width - 3) / 2;
    let end_len = max_width - 3 - start_len;

    let start: String = chars[..start_len].iter().collect();
    let end: String = chars[chars.len() - end_len..].iter().collect();
    format!("{}...{}", start, end)
}

/// Sends `tracing` output to `bookdiff.log` when verbose. The terminal is
/// left alone because the review screen owns it.
pub fn init_logging(verbose: bool) {
    if !verbose {
        return;
    }

    let file = match std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(LOG_FILE)
    {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Failed to open {}: {}", LOG_FILE, e);
            return;
        }
    };

    let result = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init();

    if result.is_ok() {
        tracing::info!("Logging initialized");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashSet;

    #[test]
    fn generated_ids_are_unique() {
        let ids: HashSet<String> = (0..1000).map(|_| generate_id("folder")).collect();
        assert_eq!(ids.len(), 1000);
        assert!(ids.iter().all(|id| id.starts_with("folder-")));
    }

    #[rstest]
    #[case(0, "0")]
    #[case(35, "z")]
    #[case(36, "10")]
    #[case(1295, "zz")]
    fn base36_digits(#[case] value: u64, #[case] expected: &str) {
        assert_eq!(to_base36(value), expected);
    }

    #[rstest]
    #[case("short", 10, "short")]
    #[case("Bookmarks Bar / Dev / Rust", 11, "Book...Rust")]
    #[case("abcdef", 2, "...")]
    fn truncates_in_the_middle(#[case] input: &str, #[case] width: usize, #[case] expected: &str) {
        assert_eq!(truncate_path(input, width), expected);
    }
}
