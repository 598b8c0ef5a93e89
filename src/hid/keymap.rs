//! HID usage → ASCII translation.
//!
//! Two fixed 128-entry tables indexed by usage code, each entry holding the
//! unshifted and shifted character. `0` marks a usage with no printable
//! mapping (function keys, arrows, modifiers, ...).

/// Keyboard layout used for translation.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Locale {
    #[default]
    Us,
    /// JIS (Japanese, Katakana country code).
    Japanese,
}

impl Locale {
    /// Locale implied by a HID descriptor's `bCountryCode`, if any.
    pub fn from_country_code(code: u8) -> Option<Self> {
        match code {
            crate::config::COUNTRY_CODE_JAPAN => Some(Locale::Japanese),
            _ => None,
        }
    }
}

/// Returned when a usage has no printable character.
pub const NO_CHAR: u8 = 0;

pub const TABLE_LEN: usize = 128;

type Table = [[u8; 2]; TABLE_LEN];

/// US layout.
pub static US_TABLE: Table = US;

/// JIS layout: the US table with the symbol keys that move on a Japanese
/// keyboard replaced.
pub static JIS_TABLE: Table = jis_table();

#[rustfmt::skip]
const US: Table = [
    [0, 0], [0, 0], [0, 0], [0, 0],                                 // 0x00 - 0x03
    [b'a', b'A'], [b'b', b'B'], [b'c', b'C'], [b'd', b'D'],         // 0x04
    [b'e', b'E'], [b'f', b'F'], [b'g', b'G'], [b'h', b'H'],         // 0x08
    [b'i', b'I'], [b'j', b'J'], [b'k', b'K'], [b'l', b'L'],         // 0x0C
    [b'm', b'M'], [b'n', b'N'], [b'o', b'O'], [b'p', b'P'],         // 0x10
    [b'q', b'Q'], [b'r', b'R'], [b's', b'S'], [b't', b'T'],         // 0x14
    [b'u', b'U'], [b'v', b'V'], [b'w', b'W'], [b'x', b'X'],         // 0x18
    [b'y', b'Y'], [b'z', b'Z'], [b'1', b'!'], [b'2', b'@'],         // 0x1C
    [b'3', b'#'], [b'4', b'$'], [b'5', b'%'], [b'6', b'^'],         // 0x20
    [b'7', b'&'], [b'8', b'*'], [b'9', b'('], [b'0', b')'],         // 0x24
    [b'\r', b'\r'], [0x1B, 0x1B], [0x08, 0x08], [b'\t', b'\t'],     // 0x28 Enter Esc Bksp Tab
    [b' ', b' '], [b'-', b'_'], [b'=', b'+'], [b'[', b'{'],         // 0x2C
    [b']', b'}'], [b'\\', b'|'], [b'#', b'~'], [b';', b':'],        // 0x30
    [b'\'', b'"'], [b'`', b'~'], [b',', b'<'], [b'.', b'>'],        // 0x34
    [b'/', b'?'], [0, 0], [0, 0], [0, 0],                           // 0x38 / CapsLock F1 F2
    [0, 0], [0, 0], [0, 0], [0, 0],                                 // 0x3C F3-F6
    [0, 0], [0, 0], [0, 0], [0, 0],                                 // 0x40 F7-F10
    [0, 0], [0, 0], [0, 0], [0, 0],                                 // 0x44 F11 F12 PrtSc ScrLk
    [0, 0], [0, 0], [0, 0], [0, 0],                                 // 0x48 Pause Ins Home PgUp
    [0, 0], [0, 0], [0, 0], [0, 0],                                 // 0x4C Del End PgDn Right
    [0, 0], [0, 0], [0, 0], [0, 0],                                 // 0x50 Left Down Up NumLk
    [b'/', b'/'], [b'*', b'*'], [b'-', b'-'], [b'+', b'+'],         // 0x54 keypad
    [b'\r', b'\r'], [b'1', 0], [b'2', 0], [b'3', 0],                // 0x58
    [b'4', 0], [b'5', b'5'], [b'6', 0], [b'7', 0],                  // 0x5C
    [b'8', 0], [b'9', 0], [b'0', 0], [b'.', 0],                     // 0x60
    [0, 0], [0, 0], [0, 0], [b'=', b'='],                           // 0x64
    [0, 0], [0, 0], [0, 0], [0, 0],                                 // 0x68
    [0, 0], [0, 0], [0, 0], [0, 0],                                 // 0x6C
    [0, 0], [0, 0], [0, 0], [0, 0],                                 // 0x70
    [0, 0], [0, 0], [0, 0], [0, 0],                                 // 0x74
    [0, 0], [0, 0], [0, 0], [0, 0],                                 // 0x78
    [0, 0], [0, 0], [0, 0], [0, 0],                                 // 0x7C
];

const fn jis_table() -> Table {
    let mut t = US;
    t[0x1F] = [b'2', b'"'];
    t[0x23] = [b'6', b'&'];
    t[0x24] = [b'7', b'\''];
    t[0x25] = [b'8', b'('];
    t[0x26] = [b'9', b')'];
    t[0x27] = [b'0', 0];
    t[0x2D] = [b'-', b'='];
    t[0x2E] = [b'^', b'~'];
    t[0x2F] = [b'@', b'`'];
    t[0x30] = [b'[', b'{'];
    t[0x32] = [b']', b'}'];
    t[0x33] = [b';', b'+'];
    t[0x34] = [b':', b'*'];
    // Hankaku/Zenkaku
    t[0x35] = [0, 0];
    t
}

/// Translate a usage code to ASCII, or [`NO_CHAR`] if it has no printable
/// mapping in `locale`.
pub fn keycode_to_ascii(usage: u8, shift: bool, locale: Locale) -> u8 {
    let table = match locale {
        Locale::Us => &US_TABLE,
        Locale::Japanese => &JIS_TABLE,
    };
    table
        .get(usize::from(usage))
        .map_or(NO_CHAR, |entry| entry[usize::from(shift)])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letters_follow_shift() {
        assert_eq!(keycode_to_ascii(0x04, false, Locale::Us), b'a');
        assert_eq!(keycode_to_ascii(0x04, true, Locale::Us), b'A');
        assert_eq!(keycode_to_ascii(0x1D, true, Locale::Japanese), b'Z');
    }

    #[test]
    fn symbol_keys_differ_between_layouts() {
        assert_eq!(keycode_to_ascii(0x1F, true, Locale::Us), b'@');
        assert_eq!(keycode_to_ascii(0x1F, true, Locale::Japanese), b'"');
        assert_eq!(keycode_to_ascii(0x2F, false, Locale::Us), b'[');
        assert_eq!(keycode_to_ascii(0x2F, false, Locale::Japanese), b'@');
    }

    #[test]
    fn non_printable_and_out_of_range_return_sentinel() {
        assert_eq!(keycode_to_ascii(0x3A, false, Locale::Us), NO_CHAR); // F1
        assert_eq!(keycode_to_ascii(0xE1, false, Locale::Us), NO_CHAR); // LeftShift
        assert_eq!(keycode_to_ascii(0xFF, true, Locale::Japanese), NO_CHAR);
    }

    #[test]
    fn control_keys_map_to_control_chars() {
        assert_eq!(keycode_to_ascii(0x28, false, Locale::Us), b'\r');
        assert_eq!(keycode_to_ascii(0x2C, true, Locale::Us), b' ');
    }

    #[test]
    fn country_code_15_selects_japanese() {
        assert_eq!(Locale::from_country_code(15), Some(Locale::Japanese));
        assert_eq!(Locale::from_country_code(0), None);
        assert_eq!(Locale::from_country_code(33), None);
    }
}
