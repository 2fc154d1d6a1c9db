use chrono::Local;

/// Truncate to at most `max` characters, never splitting a code point.
pub fn truncate_chars(s: &str, max: usize) -> &str {
    s.char_indices().nth(max).map_or(s, |(i, _)| &s[..i])
}

pub fn floor_boundary(s: &str, mut i: usize) -> usize {
    if i >= s.len() {
        return s.len();
    }
    while !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

fn ceil_boundary(s: &str, mut i: usize) -> usize {
    if i >= s.len() {
        return s.len();
    }
    while !s.is_char_boundary(i) {
        i += 1;
    }
    i
}

/// Slice `[start, end)` widened by `pad` bytes on each side, clamped to
/// char boundaries.
pub fn char_window(s: &str, start: usize, end: usize, pad: usize) -> &str {
    let lo = floor_boundary(s, start.saturating_sub(pad));
    let hi = ceil_boundary(s, end.saturating_add(pad).min(s.len()));
    &s[lo..hi]
}

pub fn collapse_ws(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for word in s.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    out
}

pub fn now_full() -> String {
    Local::now().format("%d/%m/%Y %H:%M:%S").to_string()
}

pub fn now_day() -> String {
    Local::now().format("%d/%m/%Y").to_string()
}

pub fn now_short() -> String {
    Local::now().format("%d/%m %H:%M:%S").to_string()
}

pub fn now_time() -> String {
    Local::now().format("%H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::{char_window, collapse_ws, truncate_chars};

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("contraseña", 9), "contraseñ");
        assert_eq!(truncate_chars("20:00", 10), "20:00");
        assert_eq!(truncate_chars("", 3), "");
    }

    #[test]
    fn window_clamps_to_boundaries() {
        let s = "cancha número cinco 20:00 a 22:00 libre";
        let start = s.find("20:00").unwrap();
        let w = char_window(s, start, start + 5, 9);
        assert!(w.contains("20:00"));
        assert!(s.contains(w));

        // pad lands inside the two-byte 'ú' without panicking
        let s = "número";
        let _ = char_window(s, 2, 3, 1);
    }

    #[test]
    fn collapse_squeezes_runs() {
        assert_eq!(collapse_ws("  20   a\n\t22  "), "20 a 22");
        assert_eq!(collapse_ws(""), "");
    }
}
