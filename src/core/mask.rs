//! Core mask parsing, generalized from `spdk_app_parse_core_mask` /
//! `spdk_reactor_parse_mask` in the original C reactor. A mask is a
//! hexadecimal bitset, optionally `0x`-prefixed; bit `i` selects lcore
//! `i`. Bits naming a disabled lcore are silently cleared rather than
//! rejected -- only a malformed string is an error (§7, class b).

use crate::error::{CoreError, InvalidMask};
use crate::hal::CoreHal;
use snafu::ensure;

/// Parse `mask` and clear any bit whose lcore is not enabled by `hal`.
/// Does not check for the master core's bit; callers that require a
/// master bit (lifecycle `init`) check that separately once they know
/// which core is master.
pub fn parse_mask(hal: &dyn CoreHal, mask: &str) -> Result<u64, CoreError> {
    let digits = mask.strip_prefix("0x").or_else(|| mask.strip_prefix("0X")).unwrap_or(mask);

    ensure!(!digits.is_empty(), InvalidMask { mask });

    let mut parsed = u64::from_str_radix(digits, 16)
        .map_err(|_| CoreError::InvalidMask { mask: mask.to_string() })?;

    for i in 0..64u32 {
        if parsed & (1u64 << i) != 0 && !hal.is_enabled(i) {
            parsed &= !(1u64 << i);
        }
    }

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::TestHal;

    #[test]
    fn parses_prefixed_and_bare_hex() {
        let hal = TestHal::new(4, 1);
        assert_eq!(parse_mask(&hal, "0x6").unwrap(), 0x6);
        assert_eq!(parse_mask(&hal, "6").unwrap(), 0x6);
    }

    #[test]
    fn clears_disabled_bits() {
        let hal = TestHal::new(4, 1);
        hal.disable(2);
        assert_eq!(parse_mask(&hal, "0x6").unwrap(), 0x4);
    }

    #[test]
    fn rejects_invalid_trailing_characters() {
        let hal = TestHal::new(4, 1);
        assert!(parse_mask(&hal, "0xZZ").is_err());
        assert!(parse_mask(&hal, "").is_err());
    }
}
