/*!
 * Mode Property Tests
 */

use cabinet_fs::Mode;
use proptest::prelude::*;

const LETTERS: &[u8; 9] = b"rwxrwxrwx";

proptest! {
    #[test]
    fn prop_mode_string_is_positional(raw in any::<u32>()) {
        let mode = Mode::from_bits(raw);
        let text = mode.to_string();
        prop_assert_eq!(text.len(), 9);
        for (i, c) in text.bytes().enumerate() {
            let set = raw & (1 << (8 - i)) != 0;
            prop_assert_eq!(c, if set { LETTERS[i] } else { b'-' });
        }
    }

    #[test]
    fn prop_mode_keeps_low_nine_bits(raw in any::<u32>()) {
        prop_assert_eq!(u32::from(Mode::from_bits(raw).raw()), raw & 0o777);
    }

    #[test]
    fn prop_mode_serde_uses_raw_bits(raw in 0u32..=0o777) {
        let json = serde_json::to_string(&Mode::from_bits(raw)).unwrap();
        prop_assert_eq!(json, raw.to_string());
    }
}

#[test]
fn test_mode_rejects_high_bits_on_load() {
    assert!(serde_json::from_str::<Mode>("511").is_ok());
    assert!(serde_json::from_str::<Mode>("512").is_err());
}
