//! Canonical naming for archive folders.
//!
//! The rules run in a fixed order and the result only ever contains
//! `[a-z0-9._-]`. The result may be empty; choosing a fallback is the
//! planner's job.

use crate::scanner::EntryKind;
use unicode_normalization::UnicodeNormalization;

/// Normalize a name under the archive naming policy.
///
/// Folders go through the full character policy. For files only the stem is
/// normalized and the extension is lowercased, which keeps the function total
/// for any entry even though the planner replaces file names outright.
pub fn normalize(name: &str, kind: EntryKind) -> String {
    match kind {
        EntryKind::Folder => normalize_folder_name(name),
        EntryKind::File => match name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => {
                let ext = normalize_folder_name(ext);
                if ext.is_empty() {
                    normalize_folder_name(stem)
                } else {
                    format!("{}.{}", normalize_folder_name(stem), ext)
                }
            }
            _ => normalize_folder_name(name),
        },
    }
}

pub fn normalize_folder_name(name: &str) -> String {
    // Decomposed umlauts (u + U+0308) must reach rule 2 as one char.
    let composed: String = name.nfc().collect();

    // 1. lowercase
    let lowered = composed.to_lowercase();

    let mut out = String::with_capacity(lowered.len());
    let mut in_whitespace = false;
    for c in lowered.chars() {
        if c.is_whitespace() {
            // 5. whitespace runs collapse to a single underscore
            if !in_whitespace {
                out.push('_');
            }
            in_whitespace = true;
            continue;
        }
        in_whitespace = false;
        match c {
            // 2. umlauts and sharp s
            'ä' => out.push_str("ae"),
            'ö' => out.push_str("oe"),
            'ü' => out.push_str("ue"),
            'ß' => out.push_str("ss"),
            // 3. and 4.
            '/' => out.push_str("--"),
            '+' => out.push_str(".."),
            // 6. commas vanish
            ',' => {}
            // 7. everything else outside the allowed set vanishes
            c if is_allowed_char(c) => out.push(c),
            _ => {}
        }
    }
    out
}

/// Extra cleanup applied on top of [`normalize_folder_name`] when
/// `tidy_separators` is configured: separator runs shrink and the name is
/// trimmed of leading and trailing separators.
pub fn tidy_separators(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut prev: Option<char> = None;
    let mut run = 0usize;
    for c in name.chars() {
        if Some(c) == prev {
            run += 1;
        } else {
            run = 1;
        }
        prev = Some(c);
        let keep = match c {
            '_' => run <= 1,
            '.' | '-' => run <= 2,
            _ => true,
        };
        if keep {
            out.push(c);
        }
    }
    out.trim_matches(|c| matches!(c, '.' | '_' | '-')).to_string()
}

pub fn is_canonical(name: &str) -> bool {
    name.chars().all(is_allowed_char)
}

fn is_allowed_char(c: char) -> bool {
    matches!(c, 'a'..='z' | '0'..='9' | '.' | '_' | '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLES: &[&str] = &[
        "Müller Straße, 12",
        "ÄÖÜ äöü ß",
        "Akte 1/2",
        "A+B",
        "  leading and trailing  ",
        "tab\tand\nnewline",
        "Crème brûlée",
        "???",
        "",
        "already_fine-1.2",
        "a,,,b",
        "日本語 folder",
        "x__y..z--w",
        "__dunder__",
        "GROSSBUCHSTABEN",
        "ẞ",
        "Mu\u{0308}ller",
    ];

    #[test]
    fn test_reference_example() {
        assert_eq!(
            normalize("Müller Straße, 12", EntryKind::Folder),
            "mueller_strasse_12"
        );
    }

    #[test]
    fn test_rule_mappings() {
        assert_eq!(normalize_folder_name("ÄÖÜ"), "aeoeue");
        assert_eq!(normalize_folder_name("Fuß"), "fuss");
        assert_eq!(normalize_folder_name("Akte 1/2"), "akte_1--2");
        assert_eq!(normalize_folder_name("A+B"), "a..b");
        assert_eq!(normalize_folder_name("a \t b"), "a_b");
        assert_eq!(normalize_folder_name("a,b"), "ab");
        assert_eq!(normalize_folder_name("Crème"), "crme");
        assert_eq!(normalize_folder_name("???"), "");
    }

    #[test]
    fn test_decomposed_umlauts() {
        assert_eq!(normalize_folder_name("Mu\u{0308}ller"), "mueller");
        assert_eq!(normalize_folder_name("A\u{0308}rger O\u{0308}l"), "aerger_oel");
        assert_eq!(
            normalize_folder_name("Mu\u{0308}ller"),
            normalize_folder_name("Müller")
        );
    }

    #[test]
    fn test_output_alphabet() {
        for sample in SAMPLES {
            let out = normalize(sample, EntryKind::Folder);
            assert!(is_canonical(&out), "{:?} -> {:?}", sample, out);
            assert!(!out.contains(' '));
            assert!(!out.contains(','));
            assert_eq!(out, out.to_lowercase());
        }
    }

    #[test]
    fn test_idempotent() {
        for sample in SAMPLES {
            let once = normalize(sample, EntryKind::Folder);
            let twice = normalize(&once, EntryKind::Folder);
            assert_eq!(once, twice, "not idempotent for {:?}", sample);

            let tidy_once = tidy_separators(&once);
            assert_eq!(tidy_once, tidy_separators(&normalize_folder_name(&tidy_once)));
        }
    }

    #[test]
    fn test_tidy_separators() {
        assert_eq!(tidy_separators("x__y...z---w"), "x_y..z--w");
        assert_eq!(tidy_separators("__dunder__"), "dunder");
        assert_eq!(tidy_separators("a..b"), "a..b");
        assert_eq!(tidy_separators("._-"), "");
    }

    #[test]
    fn test_file_kind_keeps_extension() {
        assert_eq!(normalize("Scan 01.TIF", EntryKind::File), "scan_01.tif");
        assert_eq!(normalize("noext", EntryKind::File), "noext");
        assert_eq!(normalize(".hidden", EntryKind::File), ".hidden");
    }
}
