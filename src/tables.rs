//! Upper-half code tables for the built-in 8-bit encodings
//!
//! Each table maps bytes 0x80..=0xFF to UTF-16 units; the lower half of every
//! table encoding here is ASCII. `UNMAPPED` marks holes.

pub(crate) const UNMAPPED: u16 = 0xFFFF;

/// ISO-8859-1 is the identity on 0x80..=0xFF.
pub(crate) static ISO_8859_1_HIGH: [u16; 128] = {
    let mut table = [0u16; 128];
    let mut i = 0;
    while i < 128 {
        table[i] = 0x80 + i as u16;
        i += 1;
    }
    table
};

/// ISO-8859-15 replaces eight Latin-1 positions.
pub(crate) static ISO_8859_15_HIGH: [u16; 128] = {
    let mut table = [0u16; 128];
    let mut i = 0;
    while i < 128 {
        table[i] = 0x80 + i as u16;
        i += 1;
    }
    table[0x24] = 0x20AC;
    table[0x26] = 0x0160;
    table[0x28] = 0x0161;
    table[0x34] = 0x017D;
    table[0x38] = 0x017E;
    table[0x3C] = 0x0152;
    table[0x3D] = 0x0153;
    table[0x3E] = 0x0178;
    table
};

#[rustfmt::skip]
const WINDOWS_1252_C1: [u16; 32] = [
    0x20AC, UNMAPPED, 0x201A, 0x0192, 0x201E, 0x2026, 0x2020, 0x2021,
    0x02C6, 0x2030, 0x0160, 0x2039, 0x0152, UNMAPPED, 0x017D, UNMAPPED,
    UNMAPPED, 0x2018, 0x2019, 0x201C, 0x201D, 0x2022, 0x2013, 0x2014,
    0x02DC, 0x2122, 0x0161, 0x203A, 0x0153, UNMAPPED, 0x017E, 0x0178,
];

/// Windows-1252 is Latin-1 with printable characters in the C1 range.
pub(crate) static WINDOWS_1252_HIGH: [u16; 128] = {
    let mut table = [0u16; 128];
    let mut i = 0;
    while i < 128 {
        table[i] = if i < 32 { WINDOWS_1252_C1[i] } else { 0x80 + i as u16 };
        i += 1;
    }
    table
};

#[rustfmt::skip]
pub(crate) static MAC_ROMAN_HIGH: [u16; 128] = [
    // 0x80
    0x00C4, 0x00C5, 0x00C7, 0x00C9, 0x00D1, 0x00D6, 0x00DC, 0x00E1,
    0x00E0, 0x00E2, 0x00E4, 0x00E3, 0x00E5, 0x00E7, 0x00E9, 0x00E8,
    // 0x90
    0x00EA, 0x00EB, 0x00ED, 0x00EC, 0x00EE, 0x00EF, 0x00F1, 0x00F3,
    0x00F2, 0x00F4, 0x00F6, 0x00F5, 0x00FA, 0x00F9, 0x00FB, 0x00FC,
    // 0xA0
    0x2020, 0x00B0, 0x00A2, 0x00A3, 0x00A7, 0x2022, 0x00B6, 0x00DF,
    0x00AE, 0x00A9, 0x2122, 0x00B4, 0x00A8, 0x2260, 0x00C6, 0x00D8,
    // 0xB0
    0x221E, 0x00B1, 0x2264, 0x2265, 0x00A5, 0x00B5, 0x2202, 0x2211,
    0x220F, 0x03C0, 0x222B, 0x00AA, 0x00BA, 0x03A9, 0x00E6, 0x00F8,
    // 0xC0
    0x00BF, 0x00A1, 0x00AC, 0x221A, 0x0192, 0x2248, 0x2206, 0x00AB,
    0x00BB, 0x2026, 0x00A0, 0x00C0, 0x00C3, 0x00D5, 0x0152, 0x0153,
    // 0xD0
    0x2013, 0x2014, 0x201C, 0x201D, 0x2018, 0x2019, 0x00F7, 0x25CA,
    0x00FF, 0x0178, 0x2044, 0x20AC, 0x2039, 0x203A, 0xFB01, 0xFB02,
    // 0xE0
    0x2021, 0x00B7, 0x201A, 0x201E, 0x2030, 0x00C2, 0x00CA, 0x00C1,
    0x00CB, 0x00C8, 0x00CD, 0x00CE, 0x00CF, 0x00CC, 0x00D3, 0x00D4,
    // 0xF0
    0xF8FF, 0x00D2, 0x00DA, 0x00DB, 0x00D9, 0x0131, 0x02C6, 0x02DC,
    0x00AF, 0x02D8, 0x02D9, 0x02DA, 0x00B8, 0x02DD, 0x02DB, 0x02C7,
];

/// Unit for `byte` under a table whose lower half is ASCII
#[inline]
pub(crate) fn lookup(high: &[u16; 128], byte: u8) -> Option<u16> {
    if byte < 0x80 {
        return Some(u16::from(byte));
    }
    match high[usize::from(byte - 0x80)] {
        UNMAPPED => None,
        unit => Some(unit),
    }
}

/// Byte for `unit` under a table whose lower half is ASCII
#[inline]
pub(crate) fn reverse_lookup(high: &[u16; 128], unit: u16) -> Option<u8> {
    if unit < 0x80 {
        return Some(unit as u8);
    }
    if unit == UNMAPPED {
        return None;
    }
    high.iter()
        .position(|&mapped| mapped == unit)
        .map(|index| 0x80 + index as u8)
}
