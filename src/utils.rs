// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Utility functions for tgdrop.

/// Mask a phone number (or any identifier) for logging.
///
/// Keeps the first `visible_prefix` characters, usually the country code,
/// and replaces every remaining character with `*`. Values no longer than
/// the prefix are fully masked.
///
/// # Examples
///
/// ```
/// use tgdrop::utils::mask_sensitive;
///
/// assert_eq!(mask_sensitive("+4915112345678", 3), "+49***********");
/// ```
pub fn mask_sensitive(input: &str, visible_prefix: usize) -> String {
    let total = input.chars().count();
    if total <= visible_prefix {
        return "*".repeat(total.max(3));
    }

    let prefix: String = input.chars().take(visible_prefix).collect();
    format!("{}{}", prefix, "*".repeat(total - visible_prefix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_sensitive() {
        assert_eq!(mask_sensitive("+1234567890", 2), "+1*********");
        assert_eq!(mask_sensitive("abc", 8), "***");
        assert_eq!(mask_sensitive("", 8), "***");
    }
}
