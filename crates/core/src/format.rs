/// Format seconds as an ffmpeg timestamp, `HH:MM:SS.mmm`
pub fn format_timestamp(seconds: f64) -> String {
    let total_millis = (seconds.max(0.0) * 1000.0).round() as u64;
    let hours = total_millis / 3_600_000;
    let mins = (total_millis / 60_000) % 60;
    let secs = (total_millis / 1000) % 60;
    let millis = total_millis % 1000;
    format!("{:02}:{:02}:{:02}.{:03}", hours, mins, secs, millis)
}

/// Substitute `{name}` placeholders. Unknown placeholders are left as is.
pub fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    values
        .iter()
        .fold(template.to_string(), |acc, (name, value)| {
            acc.replace(&format!("{{{name}}}"), value)
        })
}

/// "quick python tip" -> "Quick Python Tip"
pub fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Cut `text` to at most `max_chars` characters on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps() {
        assert_eq!(format_timestamp(0.0), "00:00:00.000");
        assert_eq!(format_timestamp(61.5), "00:01:01.500");
        assert_eq!(format_timestamp(3725.0416), "01:02:05.042");
        assert_eq!(format_timestamp(-3.0), "00:00:00.000");
    }

    #[test]
    fn templates() {
        let filled = fill_template(
            "Quick Tech Tip — {date} ({topic}) {unknown}",
            &[("date", "2026-10-19"), ("topic", "css layout trick")],
        );
        assert_eq!(filled, "Quick Tech Tip — 2026-10-19 (css layout trick) {unknown}");
    }

    #[test]
    fn title_casing() {
        assert_eq!(title_case("quick python tip"), "Quick Python Tip");
        assert_eq!(title_case("  AI   prompt trick "), "AI Prompt Trick");
        assert_eq!(title_case(""), "");
    }

    #[test]
    fn truncation_respects_chars() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }
}
