//! Phone number normalization and display formatting.
//!
//! The tool assumes a single target country; numbers pasted without a
//! country code get [`COUNTRY_CODE`] prepended.

/// Default country-code prefix (Brazil).
pub const COUNTRY_CODE: &str = "55";

/// Shortest canonical phone that can enter the contact store.
pub const MIN_PHONE_DIGITS: usize = 10;

/// Strip everything but ASCII digits.
pub fn digits_only(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Clean raw text into a canonical phone key.
///
/// Never fails: shapes that are not recognised come back as bare digits and
/// the importer drops them by length.
pub fn normalize(raw: &str) -> String {
    let cleaned = digits_only(raw);

    if (10..=11).contains(&cleaned.len()) {
        return format!("{COUNTRY_CODE}{cleaned}");
    }

    // Already carries the country code (or is some other shape); either way
    // the bare digits are the best we can do.
    cleaned
}

/// Format a canonical phone for display, e.g. `(11) 99999-8888`.
///
/// Anything that is not `55` + 10/11 digits is returned unchanged.
pub fn format_display(phone: &str) -> String {
    let Some(local) = phone.strip_prefix(COUNTRY_CODE) else {
        return phone.to_string();
    };
    if !local.bytes().all(|b| b.is_ascii_digit()) {
        return phone.to_string();
    }

    match local.len() {
        11 => format!("({}) {}-{}", &local[..2], &local[2..7], &local[7..]),
        10 => format!("({}) {}-{}", &local[..2], &local[2..6], &local[6..]),
        _ => phone.to_string(),
    }
}
