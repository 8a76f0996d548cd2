// ABOUTME: Undoes the character-position scrambling applied to the decrypted image list.
// ABOUTME: Key digits are embedded at positions named by `str.charAt(N)` calls in the script.

use once_cell::sync::Lazy;
use regex::Regex;

static KEY_LOCATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"str\.charAt\(\s*(\d+)\s*\)").unwrap());

/// Distinct `str.charAt(N)` positions in order of first appearance.
pub fn key_locations(script: &str) -> Vec<usize> {
    let mut locations = Vec::new();
    for caps in KEY_LOCATION.captures_iter(script) {
        if let Ok(n) = caps[1].parse::<usize>() {
            if !locations.contains(&n) {
                locations.push(n);
            }
        }
    }
    locations
}

/// Restores the image list, or returns it unchanged when it does not carry key digits.
///
/// Every digit is read at its original offset before any deletion. The digit at position `p`
/// (the `i`-th location) is then removed at `p - i`, mirroring the page script; a removal
/// that would fall outside the shrinking text is skipped.
pub fn unscramble_image_list(text: &str, script: &str) -> String {
    let locations = key_locations(script);
    if locations.is_empty() {
        return text.to_string();
    }

    let mut chars: Vec<char> = text.chars().collect();
    let mut keys = Vec::with_capacity(locations.len());
    for &loc in &locations {
        match chars.get(loc).and_then(|c| c.to_digit(10)) {
            Some(d) => keys.push(d as usize),
            None => return text.to_string(),
        }
    }

    for (idx, &loc) in locations.iter().enumerate() {
        if let Some(at) = loc.checked_sub(idx).filter(|at| *at < chars.len()) {
            chars.remove(at);
        }
    }

    unscramble(&mut chars, &keys);
    chars.into_iter().collect()
}

/// For each key from last to first, swaps every odd index `i >= k` with `i - k`,
/// walking `i` downwards.
pub fn unscramble(chars: &mut [char], keys: &[usize]) {
    for &k in keys.iter().rev() {
        if k == 0 {
            continue;
        }
        for i in (k..chars.len()).rev() {
            if i % 2 != 0 {
                chars.swap(i - k, i);
            }
        }
    }
}
