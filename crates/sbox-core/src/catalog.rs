//! Built-in S-boxes used by the CLI, demos and tests.

use crate::sbox::SBox;

const CATALOG: &[(&str, &[u32])] = &[
    (
        "present",
        &[0xC, 0x5, 0x6, 0xB, 0x9, 0x0, 0xA, 0xD, 0x3, 0xE, 0xF, 0x8, 0x4, 0x7, 0x1, 0x2],
    ),
    (
        "gift",
        &[0x1, 0xA, 0x4, 0xC, 0x6, 0xF, 0x3, 0x9, 0x2, 0xD, 0xB, 0x7, 0x5, 0x0, 0x8, 0xE],
    ),
    (
        "rectangle",
        &[0x6, 0x5, 0xC, 0xA, 0x1, 0xE, 0x7, 0x9, 0xB, 0x0, 0x3, 0xD, 0x8, 0xF, 0x4, 0x2],
    ),
    ("printcipher", &[0, 1, 3, 6, 7, 4, 5, 2]),
    ("swap2", &[1, 0, 3, 2]),
];

/// Names of the built-in S-boxes.
pub fn names() -> impl Iterator<Item = &'static str> {
    CATALOG.iter().map(|(name, _)| *name)
}

/// Looks up a built-in S-box by name (case-insensitive).
pub fn builtin(name: &str) -> Option<SBox> {
    let (name, table) = CATALOG
        .iter()
        .find(|(candidate, _)| candidate.eq_ignore_ascii_case(name))?;
    SBox::square(*name, table.to_vec()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_entry_is_a_permutation() {
        for name in names() {
            let sbox = builtin(name).expect("catalogue entries are valid");
            assert!(sbox.is_permutation(), "{name}");
        }
    }

    #[test]
    fn lookup_ignores_case() {
        assert_eq!(builtin("PRESENT").map(|s| s.input_bits()), Some(4));
        assert!(builtin("missing").is_none());
    }
}
