//! Plain-text cleanup of card fields before they go into a prompt.

/// Strip HTML from a card field and collapse whitespace.
///
/// Line breaks, `&nbsp;` and any `<tag>` become a single space.
pub fn sanitize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(ch) = rest.chars().next() {
        if ch == '<' {
            // `<` followed by at least one char and a closing `>` is a tag
            if let Some(end) = rest[1..].find('>').filter(|&end| end > 0) {
                out.push(' ');
                rest = &rest[end + 2..];
                continue;
            }
        } else if ch == '&' && starts_with_ignore_case(rest, "&nbsp;") {
            out.push(' ');
            rest = &rest["&nbsp;".len()..];
            continue;
        }
        out.push(ch);
        rest = &rest[ch.len_utf8()..];
    }

    collapse_whitespace(&out)
}

/// Collapse runs of whitespace into single spaces and trim.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Shorten to at most `max_chars` characters, marking the cut with "...".
pub fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let keep = max_chars.saturating_sub(3);
    let mut out: String = text.chars().take(keep).collect();
    out.push_str("...");
    out
}

fn starts_with_ignore_case(text: &str, prefix: &str) -> bool {
    text.get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}
