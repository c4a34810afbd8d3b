use colored::Colorize;

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a section header
pub fn section(title: &str) {
    println!();
    println!("{}", title.cyan().bold());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// Shorten a value for one-line display, keeping the start
pub fn truncate_value(value: &str, max_len: usize) -> String {
    let first_line = value.lines().next().unwrap_or("");
    let multiline = first_line.len() < value.trim_end().len();
    let count = first_line.chars().count();

    if count <= max_len && !multiline {
        first_line.to_string()
    } else if max_len <= 3 {
        "...".to_string()
    } else {
        let kept: String = first_line.chars().take(max_len - 3).collect();
        format!("{kept}...")
    }
}

/// "1 key", "2 keys"
pub fn count(n: usize, noun: &str) -> String {
    if n == 1 {
        format!("{n} {noun}")
    } else {
        format!("{n} {noun}s")
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_value_short() {
        assert_eq!(truncate_value("ami-1234", 20), "ami-1234");
        assert_eq!(truncate_value("exact", 5), "exact");
    }

    #[test]
    fn test_truncate_value_long() {
        assert_eq!(truncate_value("abcdefghijklmnop", 10), "abcdefg...");
    }

    #[test]
    fn test_truncate_value_multiline() {
        assert_eq!(truncate_value("line one\nline two", 40), "line one...");
        assert_eq!(truncate_value("trailing\n", 40), "trailing");
    }

    #[test]
    fn test_truncate_value_edge_cases() {
        assert_eq!(truncate_value("test", 3), "...");
        assert_eq!(truncate_value("", 10), "");
    }

    #[test]
    fn test_truncate_value_multibyte() {
        assert_eq!(truncate_value("ééééééé", 5), "éé...");
    }

    #[test]
    fn test_count() {
        assert_eq!(count(0, "key"), "0 keys");
        assert_eq!(count(1, "key"), "1 key");
        assert_eq!(count(3, "resource"), "3 resources");
    }
}
