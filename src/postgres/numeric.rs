//! Decimal text to and from the binary NUMERIC format, so decimal columns
//! bind and read back without passing through a float.
//!
//! Layout: `ndigits: i16, weight: i16, sign: u16, dscale: u16`, then
//! `ndigits` base-10000 digits, most significant first. `weight` is the
//! power of 10000 of the first digit.

use std::error::Error;

use tokio_postgres::types::{FromSql, Type};
use tokio_util::bytes::{BufMut, BytesMut};

type BoxError = Box<dyn Error + Sync + Send>;

const POSITIVE: u16 = 0x0000;
const NEGATIVE: u16 = 0x4000;
const NAN: u16 = 0xC000;
const POSITIVE_INFINITY: u16 = 0xD000;
const NEGATIVE_INFINITY: u16 = 0xF000;

const GROUP: usize = 4;

/// Write decimal `text` (`-12.50`, `NaN`, `Infinity`) as a NUMERIC value.
/// Exponent notation is not accepted.
pub(crate) fn encode(text: &str, out: &mut BytesMut) -> Result<(), BoxError> {
    let text = text.trim();
    let special = match text.to_ascii_lowercase().as_str() {
        "nan" => Some(NAN),
        "infinity" | "+infinity" | "inf" => Some(POSITIVE_INFINITY),
        "-infinity" | "-inf" => Some(NEGATIVE_INFINITY),
        _ => None,
    };
    if let Some(sign) = special {
        write_header(out, 0, 0, sign, 0);
        return Ok(());
    }

    let invalid = || -> BoxError { format!("cannot bind {text:?} to a numeric column").into() };
    let (negative, unsigned) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let (int_part, frac_part) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    if (int_part.is_empty() && frac_part.is_empty())
        || !int_part.bytes().chain(frac_part.bytes()).all(|b| b.is_ascii_digit())
    {
        return Err(invalid());
    }
    let dscale = u16::try_from(frac_part.len()).map_err(|_| invalid())?;
    let int_part = int_part.trim_start_matches('0');

    // Integer digits group leftwards from the point, fraction digits rightwards.
    let lead = (GROUP - int_part.len() % GROUP) % GROUP;
    let tail = (GROUP - frac_part.len() % GROUP) % GROUP;
    let mut padded = "0".repeat(lead);
    padded.push_str(int_part);
    padded.push_str(frac_part);
    padded.push_str(&"0".repeat(tail));

    let mut digits: Vec<i16> = padded
        .as_bytes()
        .chunks(GROUP)
        .map(|chunk| chunk.iter().fold(0_i16, |acc, b| acc * 10 + i16::from(*b - b'0')))
        .collect();
    let int_groups = i32::try_from((lead + int_part.len()) / GROUP).map_err(|_| invalid())?;
    let mut weight = int_groups - 1;

    let leading_zeros = digits.iter().take_while(|d| **d == 0).count();
    digits.drain(..leading_zeros);
    weight -= i32::try_from(leading_zeros).map_err(|_| invalid())?;
    while digits.last() == Some(&0) {
        digits.pop();
    }

    let (weight, sign) = if digits.is_empty() {
        (0, POSITIVE)
    } else {
        let sign = if negative { NEGATIVE } else { POSITIVE };
        (i16::try_from(weight).map_err(|_| invalid())?, sign)
    };
    let ndigits = i16::try_from(digits.len()).map_err(|_| invalid())?;

    write_header(out, ndigits, weight, sign, dscale);
    for digit in digits {
        out.put_i16(digit);
    }
    Ok(())
}

fn write_header(out: &mut BytesMut, ndigits: i16, weight: i16, sign: u16, dscale: u16) {
    out.reserve(8 + 2 * usize::try_from(ndigits).unwrap_or(0));
    out.put_i16(ndigits);
    out.put_i16(weight);
    out.put_u16(sign);
    out.put_u16(dscale);
}

fn pair(raw: &[u8], at: usize) -> Result<[u8; 2], BoxError> {
    raw.get(at..at + 2)
        .map(|b| [b[0], b[1]])
        .ok_or_else(|| "truncated numeric value".into())
}

/// Read a NUMERIC value back as decimal text carrying its full scale.
pub(crate) fn decode(raw: &[u8]) -> Result<String, BoxError> {
    let ndigits = usize::try_from(i16::from_be_bytes(pair(raw, 0)?))?;
    let weight = i32::from(i16::from_be_bytes(pair(raw, 2)?));
    let sign = u16::from_be_bytes(pair(raw, 4)?);
    let dscale = usize::from(u16::from_be_bytes(pair(raw, 6)?));

    match sign {
        NAN => return Ok("NaN".to_string()),
        POSITIVE_INFINITY => return Ok("Infinity".to_string()),
        NEGATIVE_INFINITY => return Ok("-Infinity".to_string()),
        POSITIVE | NEGATIVE => {}
        other => return Err(format!("unknown numeric sign {other:#06x}").into()),
    }

    let digits = (0..ndigits)
        .map(|i| {
            let digit = i16::from_be_bytes(pair(raw, 8 + 2 * i)?);
            if (0..10_000).contains(&digit) {
                Ok(digit)
            } else {
                Err(BoxError::from(format!("numeric digit {digit} out of range")))
            }
        })
        .collect::<Result<Vec<_>, _>>()?;
    let digit_at = |idx: i32| {
        usize::try_from(idx)
            .ok()
            .and_then(|i| digits.get(i))
            .copied()
            .unwrap_or(0)
    };

    let mut text = String::new();
    if sign == NEGATIVE {
        text.push('-');
    }
    if weight < 0 {
        text.push('0');
    } else {
        text.push_str(&digit_at(0).to_string());
        for idx in 1..=weight {
            text.push_str(&format!("{:04}", digit_at(idx)));
        }
    }

    if dscale > 0 {
        let mut fraction = String::with_capacity(dscale + GROUP);
        let mut idx = weight + 1;
        while fraction.len() < dscale {
            fraction.push_str(&format!("{:04}", digit_at(idx)));
            idx += 1;
        }
        fraction.truncate(dscale);
        text.push('.');
        text.push_str(&fraction);
    }
    Ok(text)
}

/// NUMERIC column read as its decimal text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumericText(pub String);

impl<'a> FromSql<'a> for NumericText {
    fn from_sql(_ty: &Type, raw: &'a [u8]) -> Result<Self, BoxError> {
        decode(raw).map(NumericText)
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::NUMERIC
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(text: &str) -> Vec<u8> {
        let mut buf = BytesMut::new();
        encode(text, &mut buf).unwrap();
        buf.to_vec()
    }

    #[test]
    fn integers_and_fractions_use_base_10000_groups() {
        assert_eq!(encoded("1"), [0, 1, 0, 0, 0, 0, 0, 0, 0, 1]);
        // 2.5 -> digits [2, 5000], weight 0, scale 1
        assert_eq!(encoded("2.5"), [0, 2, 0, 0, 0, 0, 0, 1, 0, 2, 0x13, 0x88]);
        // -0.05 -> digits [500], weight -1, scale 2
        assert_eq!(encoded("-0.05"), [0, 1, 0xFF, 0xFF, 0x40, 0, 0, 2, 0x01, 0xF4]);
    }

    #[test]
    fn zero_is_unsigned_with_no_digits() {
        assert_eq!(encoded("-0.00"), [0, 0, 0, 0, 0, 0, 0, 2]);
        assert_eq!(decode(&encoded("-0.00")).unwrap(), "0.00");
    }

    #[test]
    fn decoded_text_keeps_the_column_scale() {
        // 123456.789 -> digits [12, 3456, 7890], weight 1, scale 3
        let raw = [0, 3, 0, 1, 0, 0, 0, 3, 0, 12, 0x0D, 0x80, 0x1E, 0xD2];
        assert_eq!(decode(&raw).unwrap(), "123456.789");
        assert_eq!(decode(&encoded("10000")).unwrap(), "10000");
        assert_eq!(decode(&encoded("0.00001")).unwrap(), "0.00001");
        assert_eq!(decode(&encoded("-0.05")).unwrap(), "-0.05");
    }

    #[test]
    fn special_values_and_garbage() {
        assert_eq!(decode(&encoded("NaN")).unwrap(), "NaN");
        assert_eq!(decode(&encoded("-Infinity")).unwrap(), "-Infinity");
        let mut buf = BytesMut::new();
        assert!(encode("1e5", &mut buf).is_err());
        assert!(encode(".", &mut buf).is_err());
        assert!(encode("12.3.4", &mut buf).is_err());
        assert!(decode(&[0, 1, 0, 0]).is_err());
    }
}
