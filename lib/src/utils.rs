pub const SIZE_1KB: u64 = 1024;
pub const SIZE_1MB: u64 = 1024 * SIZE_1KB;
pub const SIZE_1GB: u64 = 1024 * SIZE_1MB;

/// Render a byte count the way the cleanup report prints it.
pub fn format_file_size(size: u64) -> String {
    if size >= SIZE_1GB {
        format!("{:.2} GB", (size as f64) / (SIZE_1GB as f64))
    } else if size >= SIZE_1MB {
        format!("{:.2} MB", (size as f64) / (SIZE_1MB as f64))
    } else if size >= SIZE_1KB {
        format!("{:.2} KB", (size as f64) / (SIZE_1KB as f64))
    } else {
        format!("{} bytes", size)
    }
}

/// Pluralize a noun for short status lines ("1 item", "3 items").
pub fn count_label(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("{} {}", count, noun)
    } else {
        format!("{} {}s", count, noun)
    }
}
