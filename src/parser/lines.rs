/// One non-blank line of extracted text.
///
/// `indented` records whether the raw line opened with two spaces or a tab,
/// since trimming erases that signal before classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub text: String,
    pub indented: bool,
}

/// Split raw text into trimmed, non-blank lines in original order.
/// `\r\n` and lone `\r` are treated as `\n`.
pub fn segment(raw: &str) -> Vec<Line> {
    raw.replace("\r\n", "\n")
        .replace('\r', "\n")
        .split('\n')
        .filter_map(|raw_line| {
            let text = raw_line.trim();
            if text.is_empty() {
                return None;
            }
            Some(Line {
                text: text.to_string(),
                indented: raw_line.starts_with("  ") || raw_line.starts_with('\t'),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn empty_input() {
        assert!(segment("").is_empty());
        assert!(segment("\n\n  \t\n").is_empty());
    }

    #[test]
    fn trims_and_drops_blank_lines() {
        let lines = segment("Name: Alice\n\n   \nTasks:\n- one  ");
        let texts: Vec<&str> = lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["Name: Alice", "Tasks:", "- one"]);
    }

    #[test]
    fn mixed_line_endings() {
        let lines = segment("a\r\nb\rc\nd");
        let texts: Vec<&str> = lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn indentation_flag() {
        let lines = segment("top\n  two spaces\n\ttab\n single space");
        let flags: Vec<bool> = lines.iter().map(|l| l.indented).collect();
        assert_eq!(flags, vec![false, true, true, false]);
        assert_eq!(lines[1].text, "two spaces");
    }

    #[test]
    fn crlf_does_not_hide_indentation() {
        let lines = segment("Notes:\r\n  detail\r\n");
        assert_eq!(lines.len(), 2);
        assert!(lines[1].indented);
        assert_eq!(lines[1].text, "detail");
    }

    proptest! {
        #[test]
        fn never_emits_blank_lines(raw in "[ a-z:\\-\\*\\t\\r\\n0-9.]{0,200}") {
            for line in segment(&raw) {
                prop_assert!(!line.text.trim().is_empty());
                prop_assert_eq!(line.text.trim(), line.text.as_str());
            }
        }
    }
}
