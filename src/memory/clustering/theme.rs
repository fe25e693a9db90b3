// src/memory/clustering/theme.rs

//! Human-readable theme labels for clusters, derived from member text.

/// Fixed keyword -> topic table. Corpus-level topics, not an ontology.
const TOPIC_TABLE: &[(&str, &str)] = &[
    ("work", "work"),
    ("office", "work"),
    ("software", "work"),
    ("meeting", "work"),
    ("vacation", "travel"),
    ("travel", "travel"),
    ("trip", "travel"),
    ("flight", "travel"),
    ("family", "personal"),
    ("friend", "personal"),
    ("hobby", "personal"),
    ("personal", "personal"),
    ("deadline", "project"),
    ("bugs", "project"),
    ("module", "project"),
    ("feature", "project"),
];

const STOP_WORDS: &[&str] = &[
    "this", "that", "with", "have", "will", "from", "they", "been", "were", "said", "each",
    "which", "their", "time", "into", "only", "more", "very", "what", "know", "just", "first",
    "also", "after", "back", "other", "many", "than", "then", "them", "these", "some", "would",
    "make", "like", "find", "long", "down", "come", "made", "part",
];

const MAX_TOPICS: usize = 3;
const MAX_KEYWORDS_WITH_TOPICS: usize = 3;
const MAX_KEYWORDS_ALONE: usize = 5;

/// Derives a theme string from the member texts of a cluster.
///
/// Topics come from the fixed keyword table; residual keywords are the
/// remaining meaningful tokens. Both are collected in first-seen order so
/// the label is deterministic for a fixed member ordering. Falls back to
/// `cluster-<N>-items` when the texts yield nothing usable.
pub fn derive_theme(texts: &[&str]) -> String {
    let mut topics: Vec<&str> = Vec::new();
    let mut keywords: Vec<String> = Vec::new();

    for text in texts {
        for raw in text.to_lowercase().split_whitespace() {
            let word: String = raw.chars().filter(|c| c.is_ascii_alphabetic()).collect();
            if word.len() <= 3 || STOP_WORDS.contains(&word.as_str()) {
                continue;
            }

            if let Some(topic) = TOPIC_TABLE
                .iter()
                .find(|(kw, _)| *kw == word)
                .map(|(_, topic)| *topic)
            {
                if !topics.contains(&topic) {
                    topics.push(topic);
                }
            }

            if !keywords.contains(&word) {
                keywords.push(word);
            }
        }
    }

    if !topics.is_empty() {
        let mut theme = topics
            .iter()
            .take(MAX_TOPICS)
            .cloned()
            .collect::<Vec<_>>()
            .join(", ");
        if !keywords.is_empty() {
            theme.push_str(" (");
            theme.push_str(
                &keywords
                    .iter()
                    .take(MAX_KEYWORDS_WITH_TOPICS)
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(", "),
            );
            theme.push(')');
        }
        theme
    } else if !keywords.is_empty() {
        keywords
            .iter()
            .take(MAX_KEYWORDS_ALONE)
            .cloned()
            .collect::<Vec<_>>()
            .join(", ")
    } else {
        format!("cluster-{}-items", texts.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topics_and_keywords_combine() {
        let theme = derive_theme(&[
            "the project deadline moved again",
            "too many bugs in the billing module",
        ]);
        assert!(theme.starts_with("project"));
        assert!(theme.contains('('));
    }

    #[test]
    fn multiple_topics_join_in_first_seen_order() {
        let theme = derive_theme(&["work meeting about the vacation travel budget"]);
        assert!(theme.starts_with("work, travel"));
    }

    #[test]
    fn keywords_alone_when_no_topic_matches() {
        let theme = derive_theme(&["quantum entanglement experiments yesterday"]);
        assert_eq!(theme, "quantum, entanglement, experiments, yesterday");
    }

    #[test]
    fn short_and_stop_words_are_dropped() {
        // "the", "was", "it" are too short; "very" is a stop word
        let theme = derive_theme(&["the it was very gardening"]);
        assert_eq!(theme, "gardening");
    }

    #[test]
    fn empty_texts_fall_back_to_count_label() {
        let theme = derive_theme(&["", "  ", "a an"]);
        assert_eq!(theme, "cluster-3-items");
    }

    #[test]
    fn theme_is_deterministic() {
        let texts = ["project deadline pressure", "deadline slipped on the module"];
        assert_eq!(derive_theme(&texts), derive_theme(&texts));
    }
}
