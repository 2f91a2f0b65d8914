//! Token formatting for individual template elements.
//!
//! Everything here is a pure function of its arguments. Randomness is drawn
//! by the caller and passed in as a raw 20-bit value.

use chrono::{DateTime, Datelike, Utc, Weekday};

/// Largest value a `rand20` element can draw (2^20 - 1).
pub const RAND20_MAX: u32 = 0xF_FFFF;

/// Upper bound for any zero-pad width.
pub const MAX_PAD_WIDTH: usize = 64;

const DEFAULT_RAND20_FMT: &str = "X5_";
const DEFAULT_SEQ_FMT: &str = "D";
const DEFAULT_DATE_FMT: &str = "yyyy";

/// Parsed `rand20` format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rand20Format {
    /// Five uppercase hex digits.
    Hex { underscore: bool },
    /// Decimal, zero-padded and truncated to `width`.
    Decimal { width: usize, underscore: bool },
}

impl Rand20Format {
    /// Parses `X5`, `X5_`, `D<n>` or `D<n>_` (case-insensitive).
    /// Anything else falls back to hex; a trailing `_` is always honored.
    pub fn parse(fmt: &str) -> Self {
        let underscore = fmt.ends_with('_');
        let body = fmt.strip_suffix('_').unwrap_or(fmt);

        if let Some(width) = parse_decimal_width(body) {
            return Rand20Format::Decimal { width, underscore };
        }
        Rand20Format::Hex { underscore }
    }

    pub fn render(self, raw: u32) -> String {
        let raw = raw & RAND20_MAX;
        let (mut out, underscore) = match self {
            Rand20Format::Hex { underscore } => (format!("{:05X}", raw), underscore),
            Rand20Format::Decimal { width, underscore } => {
                let mut digits = format!("{:0width$}", raw, width = width);
                digits.truncate(width);
                (digits, underscore)
            }
        };
        if underscore {
            out.push('_');
        }
        out
    }
}

/// Parsed `seq` format: zero-pad width, 0 meaning no padding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeqFormat {
    pub width: usize,
}

impl SeqFormat {
    /// Parses `D` or `D<n>` (case-insensitive). Other input renders unpadded.
    pub fn parse(fmt: &str) -> Self {
        let width = if fmt.eq_ignore_ascii_case("D") {
            0
        } else {
            parse_decimal_width(fmt).unwrap_or(0)
        };
        Self { width }
    }

    pub fn with_width(width: usize) -> Self {
        Self {
            width: width.min(MAX_PAD_WIDTH),
        }
    }

    pub fn render(self, number: u64) -> String {
        if self.width == 0 {
            number.to_string()
        } else {
            format!("{:0width$}", number, width = self.width)
        }
    }
}

/// Parses `D<digits>` into a clamped width.
fn parse_decimal_width(body: &str) -> Option<usize> {
    let digits = body
        .strip_prefix('D')
        .or_else(|| body.strip_prefix('d'))?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    // Overlong digit strings saturate instead of failing.
    let width = digits.parse::<usize>().unwrap_or(usize::MAX);
    Some(width.min(MAX_PAD_WIDTH))
}

/// Renders a `fixed` element.
#[inline]
pub fn fixed(value: &str) -> String {
    value.to_string()
}

/// Renders a `rand20` element from an already-drawn value.
pub fn rand20(raw: u32, fmt: Option<&str>) -> String {
    Rand20Format::parse(fmt.unwrap_or(DEFAULT_RAND20_FMT)).render(raw)
}

/// Renders a `seq` element. `width` wins over `fmt` when both are set.
pub fn seq(number: u64, fmt: Option<&str>, width: Option<usize>) -> String {
    let format = match width {
        Some(width) => SeqFormat::with_width(width),
        None => SeqFormat::parse(fmt.unwrap_or(DEFAULT_SEQ_FMT)),
    };
    format.render(number)
}

/// Date tokens, longest first so that `yyyy` wins over `yy` and `ddd` over `dd`.
const DATE_TOKENS: [&str; 7] = ["yyyy", "yy", "MM", "M", "ddd", "dd", "d"];

/// Renders a `date` element at `at`.
///
/// A format without any date-like characters is returned as-is, which lets
/// users put literals such as `2015` or `Q1` in a date slot.
pub fn date(at: &DateTime<Utc>, fmt: Option<&str>) -> String {
    let fmt = fmt.unwrap_or(DEFAULT_DATE_FMT);
    if fmt.is_empty() {
        return String::new();
    }
    if !fmt.chars().any(is_date_char) {
        return fmt.to_string();
    }

    let mut out = String::with_capacity(fmt.len() + 4);
    let mut rest = fmt;
    'scan: while let Some(ch) = rest.chars().next() {
        for token in DATE_TOKENS {
            if let Some(tail) = rest.strip_prefix(token) {
                push_date_token(&mut out, token, at);
                rest = tail;
                continue 'scan;
            }
        }
        out.push(ch);
        rest = &rest[ch.len_utf8()..];
    }
    out
}

#[inline]
fn is_date_char(c: char) -> bool {
    matches!(c.to_ascii_lowercase(), 'y' | 'm' | 'd' | 'h' | 's')
}

fn push_date_token(out: &mut String, token: &str, at: &DateTime<Utc>) {
    use std::fmt::Write;

    let _ = match token {
        "yyyy" => write!(out, "{:04}", at.year()),
        "yy" => write!(out, "{:02}", at.year().rem_euclid(100)),
        "MM" => write!(out, "{:02}", at.month()),
        "M" => write!(out, "{}", at.month()),
        "ddd" => write!(out, "{}", weekday_abbrev(at.weekday())),
        "dd" => write!(out, "{:02}", at.day()),
        "d" => write!(out, "{}", at.day()),
        other => write!(out, "{}", other),
    };
}

fn weekday_abbrev(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Mon",
        Weekday::Tue => "Tue",
        Weekday::Wed => "Wed",
        Weekday::Thu => "Thu",
        Weekday::Fri => "Fri",
        Weekday::Sat => "Sat",
        Weekday::Sun => "Sun",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn march_15() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 10, 30, 0).unwrap()
    }

    #[test]
    fn fixed_is_verbatim() {
        assert_eq!(fixed("ABC- "), "ABC- ");
        assert_eq!(fixed(""), "");
    }

    #[test]
    fn rand20_hex_is_padded_uppercase() {
        assert_eq!(rand20(0, Some("X5_")), "00000_");
        assert_eq!(rand20(0xABC, Some("X5")), "00ABC");
        assert_eq!(rand20(RAND20_MAX, Some("x5_")), "FFFFF_");
    }

    #[test]
    fn rand20_masks_to_twenty_bits() {
        assert_eq!(rand20(0x1F_FFFF, Some("X5")), "FFFFF");
    }

    #[test]
    fn rand20_decimal_pads_and_truncates() {
        assert_eq!(rand20(42, Some("D6")), "000042");
        assert_eq!(rand20(42, Some("D6_")), "000042_");
        assert_eq!(rand20(1_048_575, Some("D3")), "104");
        assert_eq!(rand20(7, Some("d2")), "07");
    }

    #[test]
    fn rand20_unknown_format_falls_back_to_hex() {
        assert_eq!(rand20(0xBEEF, Some("Q")), "0BEEF");
        assert_eq!(rand20(0xBEEF, Some("Q_")), "0BEEF_");
        assert_eq!(rand20(0xBEEF, Some("D")), "0BEEF");
        assert_eq!(rand20(0xBEEF, None), "0BEEF_");
    }

    #[test]
    fn rand20_format_parse() {
        assert_eq!(
            Rand20Format::parse("X5_"),
            Rand20Format::Hex { underscore: true }
        );
        assert_eq!(
            Rand20Format::parse("D8"),
            Rand20Format::Decimal {
                width: 8,
                underscore: false
            }
        );
        assert_eq!(
            Rand20Format::parse("D99999999999999999999999"),
            Rand20Format::Decimal {
                width: MAX_PAD_WIDTH,
                underscore: false
            }
        );
    }

    #[test]
    fn seq_padding() {
        assert_eq!(seq(7, Some("D4"), None), "0007");
        assert_eq!(seq(7, Some("D"), None), "7");
        assert_eq!(seq(7, None, None), "7");
        assert_eq!(seq(7, Some("D0"), None), "7");
        assert_eq!(seq(123_456, Some("D3"), None), "123456");
        assert_eq!(seq(7, Some("garbage"), None), "7");
    }

    #[test]
    fn seq_width_wins_over_fmt() {
        assert_eq!(seq(7, Some("D2"), Some(4)), "0007");
        assert_eq!(seq(7, None, Some(0)), "7");
    }

    #[test]
    fn date_tokens() {
        let at = march_15();
        assert_eq!(date(&at, Some("yyyy")), "2024");
        assert_eq!(date(&at, Some("yy")), "24");
        assert_eq!(date(&at, Some("MM")), "03");
        assert_eq!(date(&at, Some("M")), "3");
        assert_eq!(date(&at, Some("dd")), "15");
        assert_eq!(date(&at, Some("d")), "15");
        assert_eq!(date(&at, Some("ddd")), "Fri");
        assert_eq!(date(&at, None), "2024");
    }

    #[test]
    fn date_composite_formats() {
        let at = march_15();
        assert_eq!(date(&at, Some("yyyy-MM")), "2024-03");
        assert_eq!(date(&at, Some("yyMMdd")), "240315");
        assert_eq!(date(&at, Some("ddd, d.M.yy")), "Fri, 15.3.24");
    }

    #[test]
    fn date_single_digit_fields() {
        let at = Utc.with_ymd_and_hms(2009, 1, 4, 0, 0, 0).unwrap();
        assert_eq!(date(&at, Some("d/M")), "4/1");
        assert_eq!(date(&at, Some("dd/MM/yy")), "04/01/09");
        assert_eq!(date(&at, Some("ddd")), "Sun");
    }

    #[test]
    fn date_literals_pass_through() {
        let at = march_15();
        assert_eq!(date(&at, Some("2015")), "2015");
        assert_eq!(date(&at, Some("Q1")), "Q1");
        assert_eq!(date(&at, Some("")), "");
    }

    #[test]
    fn date_unrecognized_text_is_kept() {
        let at = march_15();
        // 'h' marks the format as date-like but is not itself a token.
        assert_eq!(date(&at, Some("hyyyy")), "h2024");
        assert_eq!(date(&at, Some("y")), "y");
        assert_eq!(date(&at, Some("Год yyyy")), "Год 2024");
    }
}
