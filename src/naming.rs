//! `NNN-name` parsing for job directories and candidate variants.
//!
//! Batch inputs use an optional numeric prefix to order things:
//!
//! - `010-red-sneaker/` → job 10, title "red sneaker"
//! - `002-beach.png` → candidate 2, title "beach"
//! - `studio.png` → unnumbered candidate, tried after all numbered ones
//!
//! Dashes in the name portion become spaces in the display title.

/// Result of parsing an entry name like `002-warm-studio`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedName {
    /// Number prefix if present (`2` from `002-warm-studio`).
    pub number: Option<u32>,
    /// Name after the prefix with dashes preserved; the whole input when
    /// unnumbered; empty for a bare number.
    pub name: String,
    /// `name` with dashes converted to spaces.
    pub display_title: String,
}

impl ParsedName {
    /// Ordering key: numbered entries by number, then unnumbered entries.
    /// Ties (and unnumbered entries) fall back to the name.
    pub fn sort_key(&self) -> (bool, u32, &str) {
        (
            self.number.is_none(),
            self.number.unwrap_or(0),
            self.name.as_str(),
        )
    }
}

/// Parse an entry name following the `NNN-name` convention.
///
/// - `"002-warm-studio"` → number=Some(2), name="warm-studio", title="warm studio"
/// - `"003"` / `"003-"` → number=Some(3), empty name
/// - `"final-v2"` → number=None, name="final-v2", title="final v2"
pub fn parse_entry_name(input: &str) -> ParsedName {
    let (prefix, rest) = match input.split_once('-') {
        Some((prefix, rest)) => (prefix, rest),
        None => (input, ""),
    };
    let number = if !prefix.is_empty() && prefix.bytes().all(|b| b.is_ascii_digit()) {
        prefix.parse::<u32>().ok()
    } else {
        None
    };
    let name = match number {
        Some(_) => rest,
        None => input,
    };
    ParsedName {
        number,
        name: name.to_string(),
        display_title: name.replace('-', " "),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbered_job_directory() {
        let p = parse_entry_name("010-red-sneaker");
        assert_eq!(p.number, Some(10));
        assert_eq!(p.name, "red-sneaker");
        assert_eq!(p.display_title, "red sneaker");
    }

    #[test]
    fn numbered_candidate_stem() {
        let p = parse_entry_name("002-beach");
        assert_eq!(p.number, Some(2));
        assert_eq!(p.display_title, "beach");
    }

    #[test]
    fn bare_number() {
        let p = parse_entry_name("003");
        assert_eq!(p.number, Some(3));
        assert_eq!(p.name, "");
        assert_eq!(p.display_title, "");
    }

    #[test]
    fn number_with_trailing_dash() {
        let p = parse_entry_name("003-");
        assert_eq!(p.number, Some(3));
        assert_eq!(p.name, "");
    }

    #[test]
    fn unnumbered_keeps_full_name() {
        let p = parse_entry_name("final-v2");
        assert_eq!(p.number, None);
        assert_eq!(p.name, "final-v2");
        assert_eq!(p.display_title, "final v2");
    }

    #[test]
    fn signed_prefix_is_not_a_number() {
        let p = parse_entry_name("+1-boost");
        assert_eq!(p.number, None);
        assert_eq!(p.name, "+1-boost");
    }

    #[test]
    fn zero_prefix() {
        let p = parse_entry_name("000-first");
        assert_eq!(p.number, Some(0));
        assert_eq!(p.display_title, "first");
    }

    #[test]
    fn sort_key_puts_unnumbered_last() {
        let mut names = vec![
            parse_entry_name("studio"),
            parse_entry_name("010-beach"),
            parse_entry_name("002-warm"),
            parse_entry_name("alley"),
        ];
        names.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        let order: Vec<&str> = names.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(order, vec!["warm", "beach", "alley", "studio"]);
    }

    #[test]
    fn largest_number_still_sorts_before_unnumbered() {
        let max = parse_entry_name("4294967295-last");
        let unnumbered = parse_entry_name("aaa");
        assert_eq!(max.number, Some(u32::MAX));
        assert!(max.sort_key() < unnumbered.sort_key());
    }
}
