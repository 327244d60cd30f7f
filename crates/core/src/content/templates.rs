use crate::{
    config::ScriptTiming,
    format::title_case,
    types::{ScriptContent, ScriptError, Segment},
};

/// Topics picked from when the caller gives no hint.
pub const TOPICS: &[&str] = &[
    "quick python tip",
    "AI prompt trick",
    "shortcut for windows",
    "youtube growth tip",
    "productivity hack",
    "css layout trick",
];

const LIBRARY: &[(&str, [&str; 4])] = &[
    (
        "quick python tip",
        [
            "Here's one fast tip about Python.",
            "Use enumerate instead of tracking the index yourself.",
            "It keeps loops short and removes off-by-one bugs.",
            "Try it in your next script today!",
        ],
    ),
    (
        "ai prompt trick",
        [
            "Here's one fast AI prompt trick.",
            "Tell the model who the answer is for before you ask.",
            "Context about the audience changes tone and depth.",
            "Try it on your next prompt and compare!",
        ],
    ),
    (
        "shortcut for windows",
        [
            "Here's one fast Windows shortcut.",
            "Press Windows plus V to open clipboard history.",
            "It keeps everything you copied, not just the last item.",
            "Turn it on once and never lose a snippet again!",
        ],
    ),
    (
        "youtube growth tip",
        [
            "Here's one fast YouTube growth tip.",
            "Hook viewers in the first two seconds.",
            "Retention early on decides how far a video travels.",
            "Rewrite your next opening line and watch the graph!",
        ],
    ),
    (
        "productivity hack",
        [
            "Here's one fast productivity hack.",
            "Write tomorrow's first task before you stop today.",
            "Starting is the hardest part, so decide it in advance.",
            "Try it tonight and feel the difference tomorrow!",
        ],
    ),
    (
        "css layout trick",
        [
            "Here's one fast CSS layout trick.",
            "Center anything with display grid and place-items center.",
            "Two lines replace a pile of margins and transforms.",
            "Try it on your next component!",
        ],
    ),
];

/// Narration lines for `topic`. Known topics have hand-written lines,
/// anything else gets a generic template mentioning the topic.
pub fn lines_for(topic: &str) -> Vec<String> {
    let key = topic.trim().to_lowercase();
    if let Some((_, lines)) = LIBRARY.iter().find(|(name, _)| *name == key) {
        return lines.iter().map(|l| l.to_string()).collect();
    }

    vec![
        format!("Here's one fast tip about {}.", topic.trim()),
        "Step 1: Do this simple action now.".to_string(),
        "Why it works: short reason why.".to_string(),
        "Try it now — bonus tip at the end!".to_string(),
    ]
}

/// Deterministic script for `topic`. The same topic and timing always yield
/// the same script.
pub fn script_for(topic: &str, timing: &ScriptTiming) -> Result<ScriptContent, ScriptError> {
    let lines = lines_for(topic);
    let duration = timing.segment_duration(lines.len());
    let segments = lines
        .iter()
        .map(|line| Segment::new(line.clone(), duration))
        .collect();

    ScriptContent::new(
        format!("{} — Quick Tip", title_case(topic)),
        topic.trim(),
        lines.join(" "),
        segments,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_listed_topic_has_lines() {
        for topic in TOPICS {
            let lines = lines_for(topic);
            assert_eq!(lines.len(), 4, "{topic}");
            assert!(!lines[0].contains("Step 1"), "{topic} fell back to generic");
        }
    }

    #[test]
    fn unknown_topic_uses_generic_template() {
        let lines = lines_for("rust borrow checker");
        assert_eq!(lines[0], "Here's one fast tip about rust borrow checker.");
    }

    #[test]
    fn script_is_deterministic() {
        let timing = ScriptTiming::default();
        let a = script_for("productivity hack", &timing).unwrap();
        let b = script_for("productivity hack", &timing).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.title(), "Productivity Hack — Quick Tip");
        assert_eq!(a.segments().len(), 4);
        assert_eq!(a.total_duration(), 40.0);
    }
}
