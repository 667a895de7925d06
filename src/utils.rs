pub type Result<T = (), E = Box<dyn std::error::Error + Send + Sync>> = std::result::Result<T, E>;

pub fn default<T: Default>() -> T {
    T::default()
}

/// Cuts `s` to at most `cap` bytes without splitting a char.
/// If anything was cut off, the last chars are replaced with "..."
pub fn truncate(s: &str, cap: usize) -> std::borrow::Cow<'_, str> {
    if s.len() <= cap {
        return s.into();
    }

    let mut end = cap.saturating_sub(3);
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end]).into()
}

/// Cuts `s` to at most `cap` bytes without splitting a char, no ellipsis.
pub fn floor_to_boundary(s: &str, cap: usize) -> &str {
    if s.len() <= cap {
        return s;
    }

    let mut end = cap;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_keeps_short_strings() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello", 5), "hello");
    }

    #[test]
    fn truncate_marks_cut_strings() {
        assert_eq!(truncate("hello world", 8), "hello...");
        // 'é' is 2 bytes, the cut must not land inside it
        let cut = truncate("ééééé", 6);
        assert!(cut.len() <= 6);
        assert!(cut.ends_with("..."));
    }

    #[test]
    fn floor_to_boundary_respects_chars() {
        assert_eq!(floor_to_boundary("abc", 10), "abc");
        assert_eq!(floor_to_boundary("aé", 2), "a");
        assert_eq!(floor_to_boundary("aé", 3), "aé");
    }
}
