//! Fingerprint map comparison.

use std::collections::{HashMap, HashSet};

/// Return the PKs whose fingerprints differ between the two sides.
///
/// A PK is mismatched when it is present on only one side, or present on
/// both with unequal fingerprints. The returned order is unspecified.
/// Symmetric in its arguments; O(|source| + |target|).
pub fn compare_hashes(
    source: &HashMap<u64, Vec<u8>>,
    target: &HashMap<u64, Vec<u8>>,
) -> Vec<u64> {
    let mut mismatched = HashSet::new();

    for (pk, target_hash) in target {
        match source.get(pk) {
            Some(source_hash) if source_hash == target_hash => {}
            _ => {
                mismatched.insert(*pk);
            }
        }
    }

    for (pk, source_hash) in source {
        match target.get(pk) {
            Some(target_hash) if target_hash == source_hash => {}
            _ => {
                mismatched.insert(*pk);
            }
        }
    }

    mismatched.into_iter().collect()
}
