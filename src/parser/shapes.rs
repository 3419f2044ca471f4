use std::sync::LazyLock;

use regex::Regex;

use super::lines::Line;

static NUMBERED_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^([0-9]+)\.").unwrap());

/// The shape of a single line. Exactly one per line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shape {
    /// `Key: value` with a non-empty value.
    KeyValue { key: String, value: String },
    /// `Key:` with nothing after the colon. Opens a section.
    Header { key: String },
    /// `- item` or `* item`.
    Bullet(String),
    /// `3. item`
    Numbered { number: u64, content: String },
    /// Raw line started with two spaces or a tab.
    SubItem(String),
    Content(String),
}

const BULLET_MARKERS: &[char] = &['-', '*'];

/// Classify one segmented line. Rules are tried in order and the first match
/// wins: key/value or header, bullet, numbered, indented sub-item, content.
pub fn classify(line: &Line) -> Shape {
    let text = line.text.as_str();
    let is_bullet = text.starts_with(BULLET_MARKERS);

    // ── Key: value / Header: ──
    if !is_bullet {
        if let Some((raw_key, raw_value)) = text.split_once(':') {
            let key = normalize_key(raw_key);
            let value = raw_value.trim();
            return if value.is_empty() {
                Shape::Header { key }
            } else {
                Shape::KeyValue {
                    key,
                    value: value.to_string(),
                }
            };
        }
    }

    // ── Bullet: strip exactly one marker ──
    if is_bullet {
        return Shape::Bullet(text[1..].trim().to_string());
    }

    // ── Numbered: 12. content ──
    if let Some(caps) = NUMBERED_RE.captures(text) {
        let content = text[caps[0].len()..].trim().to_string();
        return match caps[1].parse::<u64>() {
            Ok(number) => Shape::Numbered { number, content },
            // ordinal too large for u64
            Err(_) => Shape::Content(text.to_string()),
        };
    }

    if line.indented {
        return Shape::SubItem(text.to_string());
    }

    Shape::Content(text.to_string())
}

/// Normalize raw header text into a camel-cased section key.
///
/// Characters outside `[A-Za-z0-9 ]` are dropped, the rest is lower-cased and
/// each space-separated word after the first is capitalized. Text that is
/// already a key (starts lowercase or with a digit, nothing but ASCII
/// alphanumerics) is returned as is, so normalizing twice changes nothing.
pub fn normalize_key(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == ' ')
        .collect();

    if is_normalized(&cleaned) {
        return cleaned;
    }

    let lower = cleaned.to_ascii_lowercase();
    let mut key = String::with_capacity(lower.len());
    for (i, word) in lower.split(' ').filter(|w| !w.is_empty()).enumerate() {
        if i == 0 {
            key.push_str(word);
            continue;
        }
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            key.push(first.to_ascii_uppercase());
            key.push_str(chars.as_str());
        }
    }
    key
}

fn is_normalized(key: &str) -> bool {
    key.chars()
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        && key.chars().all(|c| c.is_ascii_alphanumeric())
}
