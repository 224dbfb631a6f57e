//! Compact range strings
//!
//! VLAN and MST instance membership is written on the wire as comma
//! separated numbers and spans (`"1,3-5,7"`). These helpers convert between
//! that form and integer sets. [`render`] always produces the canonical form:
//! ascending, maximal runs coalesced, singletons bare.

use crate::error::{Error, Result};
use std::collections::BTreeSet;

/// Set of VLAN ids or instance numbers
pub type RangeSet = BTreeSet<u32>;

/// Highest VLAN id or MST instance a device accepts
pub const MAX_MEMBER: u32 = 4094;

/// Expand a range string into its members.
///
/// Whitespace around tokens is ignored and an empty string is the empty set.
/// Members above [`MAX_MEMBER`] are rejected before any span is expanded.
pub fn parse(s: &str) -> Result<RangeSet> {
    let mut set = RangeSet::new();
    for token in s.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        match token.split_once('-') {
            Some((start, end)) => {
                let start = parse_bound(start.trim(), s)?;
                let end = parse_bound(end.trim(), s)?;
                if start > end {
                    return Err(Error::InvalidRange(s.to_string()));
                }
                set.extend(start..=end);
            }
            None => {
                set.insert(parse_bound(token, s)?);
            }
        }
    }
    Ok(set)
}

fn parse_bound(token: &str, whole: &str) -> Result<u32> {
    token
        .parse()
        .ok()
        .filter(|n| *n <= MAX_MEMBER)
        .ok_or_else(|| Error::InvalidRange(whole.to_string()))
}

/// Render a set in canonical range form
pub fn render(set: &RangeSet) -> String {
    let mut runs: Vec<(u32, u32)> = Vec::new();
    for &n in set {
        match runs.last_mut() {
            Some((_, end)) if end.checked_add(1) == Some(n) => *end = n,
            _ => runs.push((n, n)),
        }
    }
    runs.iter()
        .map(|&(start, end)| {
            if start == end {
                start.to_string()
            } else {
                format!("{}-{}", start, end)
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Parse several range strings and union their members
pub fn union_all<'a>(parts: impl IntoIterator<Item = &'a str>) -> Result<RangeSet> {
    let mut set = RangeSet::new();
    for part in parts {
        set.extend(parse(part)?);
    }
    Ok(set)
}

/// Canonicalise a range string (`"5,1-3,4"` becomes `"1-5"`)
pub fn canonical(s: &str) -> Result<String> {
    parse(s).map(|set| render(&set))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[u32]) -> RangeSet {
        items.iter().copied().collect()
    }

    #[test]
    fn test_parse_mixed() {
        assert_eq!(parse("1,3-5,7").unwrap(), set(&[1, 3, 4, 5, 7]));
    }

    #[test]
    fn test_parse_whitespace_and_empty() {
        assert_eq!(parse(" 1 , 2 - 3 ").unwrap(), set(&[1, 2, 3]));
        assert!(parse("").unwrap().is_empty());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse("1,a").is_err());
        assert!(parse("5-3").is_err());
        assert!(parse("1-").is_err());
    }

    #[test]
    fn test_parse_rejects_members_above_ceiling() {
        assert_eq!(parse("4094").unwrap(), set(&[4094]));
        assert_eq!(parse("4090-4094").unwrap().len(), 5);
        for bad in ["4095", "1-50000000", "10,4000-4095"] {
            match parse(bad) {
                Err(Error::InvalidRange(s)) => assert_eq!(s, bad),
                other => panic!("{bad}: {other:?}"),
            }
        }
        assert!(union_all(["1-3", "1-4294967295"]).is_err());
    }

    #[test]
    fn test_render_coalesces_runs() {
        assert_eq!(render(&set(&[1, 3, 4, 5, 7])), "1,3-5,7");
        assert_eq!(render(&set(&[1, 2])), "1-2");
        assert_eq!(render(&set(&[])), "");
        assert_eq!(render(&set(&[4094])), "4094");
    }

    #[test]
    fn test_render_handles_max_value() {
        assert_eq!(render(&set(&[u32::MAX - 1, u32::MAX])), format!("{}-{}", u32::MAX - 1, u32::MAX));
    }

    #[test]
    fn test_canonical() {
        assert_eq!(canonical("5,1-3,4").unwrap(), "1-5");
        assert_eq!(canonical("1,3-5,7").unwrap(), "1,3-5,7");
    }

    #[test]
    fn test_union_all() {
        assert_eq!(union_all(["1-3", "4,5"]).unwrap(), set(&[1, 2, 3, 4, 5]));
    }
}
