//! Prompt construction for section illustrations

/// Fixed style applied to every section prompt
pub const STYLE_PREAMBLE: &str = "Technical patent illustration, black line art on a plain \
white background, clean precise strokes, no shading or color, isometric or orthographic views \
as appropriate, reference numerals allowed, no other text, in the manner of a formal patent \
drawing sheet.";

/// Bounded excerpt of section content
///
/// Takes at most `max_chars` characters (never splitting a character), trims
/// surrounding whitespace, and appends an ellipsis when text was cut.
pub fn excerpt(content: &str, max_chars: usize) -> String {
    let trimmed = content.trim();
    let mut chars = trimmed.chars();
    let head: String = chars.by_ref().take(max_chars).collect();

    if chars.next().is_some() {
        format!("{}...", head.trim_end())
    } else {
        head
    }
}

/// Build the provider prompt for one section
pub fn build_prompt(patent_title: &str, heading: &str, content: &str, excerpt_chars: usize) -> String {
    format!(
        "{style}\n\nPatent: {title}\nSection: {heading}\n\nIllustrate the following:\n{excerpt}",
        style = STYLE_PREAMBLE,
        title = patent_title.trim(),
        heading = heading.trim(),
        excerpt = excerpt(content, excerpt_chars),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_excerpt_short_content_unchanged() {
        assert_eq!(excerpt("  A lever.  ", 50), "A lever.");
    }

    #[test]
    fn test_excerpt_truncates_with_ellipsis() {
        assert_eq!(excerpt("abcdefghij", 4), "abcd...");
    }

    #[test]
    fn test_excerpt_respects_char_boundaries() {
        let text = "ééééé";
        assert_eq!(excerpt(text, 2), "éé...");
    }

    #[test]
    fn test_prompt_contains_all_parts() {
        let content = "x".repeat(1000);
        let prompt = build_prompt("Self-Stirring Mug", "Detailed Description", &content, 500);

        assert!(prompt.starts_with(STYLE_PREAMBLE));
        assert!(prompt.contains("Patent: Self-Stirring Mug"));
        assert!(prompt.contains("Section: Detailed Description"));
        assert!(prompt.contains(&format!("{}...", "x".repeat(500))));
        assert!(!prompt.contains(&"x".repeat(501)));
    }
}
