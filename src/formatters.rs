//! Input masks applied on every keystroke, before validation.
//!
//! Every formatter strips non-digits first, so re-applying a formatter to its
//! own output is a no-op.

use bigdecimal::{BigDecimal, RoundingMode};

pub const CPF_DIGITS: usize = 11;
pub const PHONE_DIGITS: usize = 11;
pub const CEP_DIGITS: usize = 8;
pub const CARD_DIGITS: usize = 16;

/// Keeps only ASCII digits.
pub fn only_digits(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

fn digits_truncated(raw: &str, max: usize) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).take(max).collect()
}

/// `11144477735` -> `111.444.777-35`, partial input masked progressively.
pub fn format_cpf(raw: &str) -> String {
    let digits = digits_truncated(raw, CPF_DIGITS);
    let len = digits.len();

    match len {
        0..=3 => digits,
        4..=6 => format!("{}.{}", &digits[..3], &digits[3..]),
        7..=9 => format!("{}.{}.{}", &digits[..3], &digits[3..6], &digits[6..]),
        _ => format!(
            "{}.{}.{}-{}",
            &digits[..3],
            &digits[3..6],
            &digits[6..9],
            &digits[9..]
        ),
    }
}

/// `11987654321` -> `(11) 98765-4321`, `1133334444` -> `(11) 3333-4444`.
pub fn format_phone(raw: &str) -> String {
    let digits = digits_truncated(raw, PHONE_DIGITS);
    if digits.len() <= 2 {
        return digits;
    }

    let (ddd, rest) = digits.split_at(2);
    if rest.len() > 4 {
        let split = rest.len() - 4;
        format!("({}) {}-{}", ddd, &rest[..split], &rest[split..])
    } else {
        format!("({}) {}", ddd, rest)
    }
}

/// `01310100` -> `01310-100`.
pub fn format_cep(raw: &str) -> String {
    let digits = digits_truncated(raw, CEP_DIGITS);
    if digits.len() > 5 {
        format!("{}-{}", &digits[..5], &digits[5..])
    } else {
        digits
    }
}

/// Groups card digits in blocks of four.
pub fn format_card_number(raw: &str) -> String {
    let digits = digits_truncated(raw, CARD_DIGITS);
    digits
        .as_bytes()
        .chunks(4)
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

/// `1229` -> `12/29`.
pub fn format_card_expiry(raw: &str) -> String {
    let digits = digits_truncated(raw, 4);
    if digits.len() > 2 {
        format!("{}/{}", &digits[..2], &digits[2..])
    } else {
        digits
    }
}

/// Brazilian currency display: `R$ 1.518,00`.
pub fn format_brl(amount: &BigDecimal) -> String {
    let rounded = amount.with_scale_round(2, RoundingMode::HalfUp);
    let plain = rounded.to_plain_string();
    let negative = plain.starts_with('-');
    let plain = plain.trim_start_matches('-').to_string();

    let (int_part, frac_part) = plain.split_once('.').unwrap_or((plain.as_str(), "00"));

    let mut grouped = String::new();
    for (idx, ch) in int_part.chars().enumerate() {
        if idx > 0 && (int_part.len() - idx) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    format!(
        "{}R$ {},{}",
        if negative { "-" } else { "" },
        grouped,
        frac_part
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_cpf_mask() {
        assert_eq!(format_cpf("11144477735"), "111.444.777-35");
        assert_eq!(format_cpf("1114"), "111.4");
        assert_eq!(format_cpf("1114447"), "111.444.7");
        assert_eq!(format_cpf("111.444.777-3599"), "111.444.777-35");
        assert_eq!(format_cpf(""), "");
    }

    #[test]
    fn test_phone_mask() {
        assert_eq!(format_phone("11987654321"), "(11) 98765-4321");
        assert_eq!(format_phone("1133334444"), "(11) 3333-4444");
        assert_eq!(format_phone("119"), "(11) 9");
        assert_eq!(format_phone("11"), "11");
        assert_eq!(format_phone("(11) 98765-43219999"), "(11) 98765-4321");
    }

    #[test]
    fn test_cep_mask() {
        assert_eq!(format_cep("01310100"), "01310-100");
        assert_eq!(format_cep("01310"), "01310");
        assert_eq!(format_cep("01310-1009"), "01310-100");
    }

    #[test]
    fn test_card_masks() {
        assert_eq!(format_card_number("4111111111111111"), "4111 1111 1111 1111");
        assert_eq!(format_card_number("41111"), "4111 1");
        assert_eq!(format_card_expiry("1229"), "12/29");
        assert_eq!(format_card_expiry("1"), "1");
    }

    #[test]
    fn test_brl() {
        let amount = BigDecimal::from_str("1518").unwrap();
        assert_eq!(format_brl(&amount), "R$ 1.518,00");
        let amount = BigDecimal::from_str("80.5").unwrap();
        assert_eq!(format_brl(&amount), "R$ 80,50");
        let amount = BigDecimal::from_str("1234567.891").unwrap();
        assert_eq!(format_brl(&amount), "R$ 1.234.567,89");
    }
}
