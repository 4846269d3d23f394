use crate::config::{ANCESTOR_SLOTS, PLACEHOLDER, SEQUENCE_WIDTH};
use std::cmp::Ordering;

/// The ancestor folder names a file is named after, nearest first.
///
/// Always exactly [`ANCESTOR_SLOTS`] slots; slots past the top of a shallow
/// tree hold [`PLACEHOLDER`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamingContext {
    slots: [String; ANCESTOR_SLOTS],
}

impl NamingContext {
    pub fn from_nearest_first<S: AsRef<str>>(ancestors: &[S]) -> Self {
        let slots = std::array::from_fn(|i| {
            ancestors
                .get(i)
                .map(|s| s.as_ref().to_string())
                .unwrap_or_else(|| PLACEHOLDER.to_string())
        });
        Self { slots }
    }

    /// Nearest ancestor first.
    pub fn slots(&self) -> &[String] {
        &self.slots
    }

    /// `ancestor4_ancestor3_ancestor2_ancestor1_NNNN.ext`
    pub fn file_name(&self, sequence: u32, extension: Option<&str>) -> String {
        let mut name = String::new();
        for slot in self.slots.iter().rev() {
            name.push_str(slot);
            name.push('_');
        }
        name.push_str(&format!("{:0width$}", sequence, width = SEQUENCE_WIDTH));
        if let Some(ext) = extension.filter(|e| !e.is_empty()) {
            name.push('.');
            name.push_str(&ext.to_lowercase());
        }
        name
    }
}

/// Digit runs compare by value, everything else case-insensitively. Falls
/// back to plain comparison so distinct names never compare equal.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let left = chunks(a);
    let right = chunks(b);
    for (l, r) in left.iter().zip(right.iter()) {
        let ord = match (l, r) {
            (Chunk::Digits(x), Chunk::Digits(y)) => compare_digits(x, y),
            (Chunk::Text(x), Chunk::Text(y)) => x.to_lowercase().cmp(&y.to_lowercase()),
            (Chunk::Digits(_), Chunk::Text(_)) => Ordering::Less,
            (Chunk::Text(_), Chunk::Digits(_)) => Ordering::Greater,
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    left.len().cmp(&right.len()).then_with(|| a.cmp(b))
}

enum Chunk<'a> {
    Digits(&'a str),
    Text(&'a str),
}

fn chunks(s: &str) -> Vec<Chunk<'_>> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut in_digits: Option<bool> = None;
    for (i, c) in s.char_indices() {
        let digit = c.is_ascii_digit();
        match in_digits {
            Some(prev) if prev != digit => {
                out.push(make_chunk(&s[start..i], prev));
                start = i;
            }
            _ => {}
        }
        in_digits = Some(digit);
    }
    if let Some(prev) = in_digits {
        out.push(make_chunk(&s[start..], prev));
    }
    out
}

fn make_chunk(s: &str, digits: bool) -> Chunk<'_> {
    if digits {
        Chunk::Digits(s)
    } else {
        Chunk::Text(s)
    }
}

fn compare_digits(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_context() {
        let ctx = NamingContext::from_nearest_first(&["sig", "bestand", "haus", "archiv"]);
        assert_eq!(ctx.file_name(1, Some("tif")), "archiv_haus_bestand_sig_0001.tif");
    }

    #[test]
    fn test_shallow_context_is_padded_from_the_outside() {
        let ctx = NamingContext::from_nearest_first(&["leaf", "parent"]);
        assert_eq!(ctx.slots(), &["leaf", "parent", "x", "x"]);
        assert_eq!(ctx.file_name(12, Some("PDF")), "x_x_parent_leaf_0012.pdf");
    }

    #[test]
    fn test_context_truncates_to_four() {
        let ctx = NamingContext::from_nearest_first(&["a", "b", "c", "d", "e"]);
        assert_eq!(ctx.file_name(3, None), "d_c_b_a_0003");
    }

    #[test]
    fn test_sequence_grows_past_width() {
        let ctx = NamingContext::from_nearest_first(&["a"]);
        assert_eq!(ctx.file_name(12345, Some("png")), "x_x_x_a_12345.png");
    }

    #[test]
    fn test_natural_cmp() {
        let mut names = vec!["img10.tif", "img2.tif", "IMG1.tif", "img02.tif"];
        names.sort_by(|a, b| natural_cmp(a, b));
        assert_eq!(names, vec!["IMG1.tif", "img02.tif", "img2.tif", "img10.tif"]);
    }
}
