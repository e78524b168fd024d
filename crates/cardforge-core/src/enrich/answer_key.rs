//! Binary answer codes for multiple-choice cards.
//!
//! A code like `"1 0 1"` marks options one and three correct. The explicit
//! answer field wins; a `back` made only of bits is accepted as the code when
//! no explicit one exists.

/// Whether `value` is a non-empty string of `0`/`1` digits, optionally
/// separated by whitespace, `,`, `;` or `|`.
pub fn is_binary_code(value: &str) -> bool {
    let trimmed = value.trim();
    !trimmed.is_empty()
        && trimmed
            .chars()
            .all(|c| matches!(c, '0' | '1' | ',' | ';' | '|') || c.is_whitespace())
}

/// Bits of a code in order (`true` = correct).
pub fn answer_bits(code: &str) -> Vec<bool> {
    code.chars()
        .filter_map(|c| match c {
            '1' => Some(true),
            '0' => Some(false),
            _ => None,
        })
        .collect()
}

/// Pick the answer code: explicit `answers` if binary, else `back` if binary.
pub fn resolve_code<'a>(answers: Option<&'a str>, back: &'a str) -> Option<&'a str> {
    answers
        .map(str::trim)
        .filter(|a| is_binary_code(a))
        .or_else(|| Some(back.trim()).filter(|b| is_binary_code(b)))
}

/// Options split by the answer key, each labelled with its 1-based number.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionPartition {
    pub correct: Vec<String>,
    pub incorrect: Vec<String>,
}

/// Partition non-empty options by their bit. Options beyond the code's
/// length are left out.
pub fn partition_options(options: &[String], bits: &[bool]) -> OptionPartition {
    let mut partition = OptionPartition::default();
    for (idx, (option, &bit)) in options.iter().zip(bits).enumerate() {
        if option.trim().is_empty() {
            continue;
        }
        let labelled = format!("{}. {}", idx + 1, option);
        if bit {
            partition.correct.push(labelled);
        } else {
            partition.incorrect.push(labelled);
        }
    }
    partition
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_code_detection() {
        assert!(is_binary_code("101"));
        assert!(is_binary_code(" 1 0 1 "));
        assert!(is_binary_code("1,0;1|1"));
        assert!(!is_binary_code(""));
        assert!(!is_binary_code("   "));
        assert!(!is_binary_code("1 0 2"));
        assert!(!is_binary_code("Infection"));
    }

    #[test]
    fn test_bits_in_order() {
        assert_eq!(answer_bits("1 0 1"), vec![true, false, true]);
        assert_eq!(answer_bits("11|0"), vec![true, true, false]);
    }

    #[test]
    fn test_explicit_code_wins_over_back() {
        assert_eq!(resolve_code(Some("101"), "0 1 0"), Some("101"));
        assert_eq!(resolve_code(Some("see text"), "0 1 0"), Some("0 1 0"));
        assert_eq!(resolve_code(None, "Infection"), None);
        assert_eq!(resolve_code(Some(""), ""), None);
    }

    #[test]
    fn test_partition_marks_a_and_c_correct() {
        let options = vec!["A".to_string(), "B".to_string(), "C".to_string()];
        let partition = partition_options(&options, &answer_bits("101"));
        assert_eq!(partition.correct, vec!["1. A", "3. C"]);
        assert_eq!(partition.incorrect, vec!["2. B"]);
    }

    #[test]
    fn test_partition_skips_blank_options_and_extra_bits() {
        let options = vec!["A".to_string(), " ".to_string()];
        let partition = partition_options(&options, &[false, true, true]);
        assert_eq!(partition.correct, Vec::<String>::new());
        assert_eq!(partition.incorrect, vec!["1. A"]);
    }
}
