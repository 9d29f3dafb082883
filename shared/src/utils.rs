use ulid::Ulid;

pub fn generate_ulid() -> String {
    Ulid::new().to_string()
}

/// Returns at most `max_bytes` of `content`, cut back to the nearest char boundary.
///
/// Used to keep upstream error bodies from flooding logs and error messages.
pub fn truncate_for_log(content: &str, max_bytes: usize) -> &str {
    if content.len() <= max_bytes {
        return content;
    }

    let mut end = max_bytes;
    while end > 0 && !content.is_char_boundary(end) {
        end -= 1;
    }

    &content[..end]
}
