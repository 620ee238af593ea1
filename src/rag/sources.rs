//! Citation rendering for the answer prompt.
//!
//! Each match becomes one line, `[S{n}] {title} — {summary}`, numbered from
//! 1 in rank order. Only titles and summaries are rendered; raw page
//! content never reaches the generator.

use crate::bookmarks::Match;

const UNTITLED: &str = "Untitled";

const PROMPT_PREAMBLE: &str =
    "You are HyperMemo. Answer the question using ONLY the provided sources. Cite sources with [S#].";

/// Citation marker for the match at rank `index` (0-based).
pub fn citation_marker(index: usize) -> String {
    format!("[S{}]", index + 1)
}

/// Collapses every whitespace run, newlines included, into one space.
fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Renders matches as a citation block, one line per match. Empty input
/// renders as "".
pub fn format_sources(matches: &[Match]) -> String {
    matches
        .iter()
        .enumerate()
        .map(|(index, m)| {
            let title = single_line(&m.bookmark.title);
            let title = if title.is_empty() { UNTITLED } else { title.as_str() };
            format!(
                "{} {} — {}",
                citation_marker(index),
                title,
                single_line(&m.bookmark.summary)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Embeds the question and the citation block in the answer prompt.
pub fn build_prompt(question: &str, sources: &str) -> String {
    let question_line = format!("Question: {question}");
    [PROMPT_PREAMBLE, question_line.as_str(), "Sources:", sources].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bookmarks::BookmarkRef;

    fn matched(title: &str, summary: &str) -> Match {
        Match {
            bookmark: BookmarkRef {
                id: title.to_string(),
                title: title.to_string(),
                url: "https://example.com".to_string(),
                summary: summary.to_string(),
                tags: vec![],
            },
            score: 0.5,
        }
    }

    #[test]
    fn test_empty_matches_render_empty() {
        assert_eq!(format_sources(&[]), "");
    }

    #[test]
    fn test_format_sources_lines() {
        let text = format_sources(&[
            matched("Rust Book", "The official guide"),
            matched("Tokio", "Async runtime"),
        ]);
        assert_eq!(
            text,
            "[S1] Rust Book — The official guide\n[S2] Tokio — Async runtime"
        );
    }

    #[test]
    fn test_untitled_fallback() {
        let text = format_sources(&[matched("  ", "summary")]);
        assert_eq!(text, "[S1] Untitled — summary");
    }

    #[test]
    fn test_multiline_fields_stay_on_one_line() {
        let text = format_sources(&[
            matched("Rust\nBook ", "The official\r\n\n  guide\t"),
            matched("\n\t", "second"),
        ]);
        assert_eq!(
            text,
            "[S1] Rust Book — The official guide\n[S2] Untitled — second"
        );
        assert_eq!(text.lines().count(), 2);
    }

    #[test]
    fn test_markers_follow_rank_order() {
        let matches: Vec<Match> = (0..7)
            .map(|i| matched(&format!("t{i}"), "s"))
            .collect();
        let text = format_sources(&matches);

        let mut last = 0;
        for k in 0..7 {
            let marker = citation_marker(k);
            let pos = text.find(&marker).expect("marker missing");
            assert!(k == 0 || pos > last);
            last = pos;
        }
        assert_eq!(text.matches("[S").count(), 7);
        assert!(!text.contains("[S8]"));
    }

    #[test]
    fn test_build_prompt() {
        let prompt = build_prompt("What is rust?", "[S1] Rust — A language");
        assert_eq!(
            prompt,
            "You are HyperMemo. Answer the question using ONLY the provided sources. Cite sources with [S#].\n\
             Question: What is rust?\n\
             Sources:\n\
             [S1] Rust — A language"
        );
    }
}
