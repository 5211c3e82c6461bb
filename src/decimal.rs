//! Unsigned integer to decimal ASCII without division.
//!
//! Each place value is peeled off by repeated subtraction, counting up from
//! `'0'`. Leading zeros are skipped, but the last digit is always kept so zero
//! renders as `"0"`.

const PLACES_U8: [u32; 3] = [100, 10, 1];
const PLACES_U16: [u32; 5] = [10_000, 1_000, 100, 10, 1];
const PLACES_U32: [u32; 10] = [
    1_000_000_000,
    100_000_000,
    10_000_000,
    1_000_000,
    100_000,
    10_000,
    1_000,
    100,
    10,
    1,
];

pub fn format_u8(num: u8, buf: &mut [u8; 3]) -> &[u8] {
    subtractive(num as u32, &PLACES_U8, buf)
}

pub fn format_u16(num: u16, buf: &mut [u8; 5]) -> &[u8] {
    subtractive(num as u32, &PLACES_U16, buf)
}

pub fn format_u32(num: u32, buf: &mut [u8; 10]) -> &[u8] {
    subtractive(num, &PLACES_U32, buf)
}

fn subtractive<'a>(mut num: u32, places: &[u32], buf: &'a mut [u8]) -> &'a [u8] {
    for (digit, &place) in buf.iter_mut().zip(places) {
        *digit = b'0';
        while num >= place {
            *digit += 1;
            num -= place;
        }
    }

    let last = places.len() - 1;
    let start = buf[..last]
        .iter()
        .position(|&d| d != b'0')
        .unwrap_or(last);
    &buf[start..places.len()]
}
