//! Pax extended-header record formatting.
//!
//! A record is `"<LEN> <KEY>=<VALUE>\n"` where `<LEN>` includes its own
//! digits and the trailing newline — self-referential, so the length is
//! found by fixed-point iteration.

/// Maximum filename/linkname field length before a pax record is required.
pub const NAME_FIELD_SIZE: usize = 100;
pub const LINKNAME_FIELD_SIZE: usize = 100;
/// 2^33 - 1: largest size that fits in the ustar `size` field's semantics
/// for this profile (8 GiB - 1).
pub const MAX_USTAR_FILE_SIZE: u64 = (1u64 << 33) - 1;

/// Compute the self-referential length of one pax record, converging by
/// fixed-point iteration from an assumed two-digit length. Converges in at
/// most 3 iterations for realistic inputs.
pub fn record_length(keyword: &str, value: &str) -> usize {
    // "<len> <keyword>=<value>\n" with len starting as a 2-digit guess.
    let mut len = keyword.len() + value.len() + 5;
    for _ in 0..8 {
        let candidate = format!("{len} {keyword}={value}\n").len();
        if candidate == len {
            return len;
        }
        len = candidate;
    }
    unreachable!("pax record length failed to converge for keyword {keyword:?}");
}

/// Render one pax record given its already-computed length.
pub fn format_record(keyword: &str, value: &str) -> String {
    let len = record_length(keyword, value);
    format!("{len} {keyword}={value}\n")
}
