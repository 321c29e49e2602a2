//! Number formats: date/time classification and display rendering of plain numbers.

/// Number format attached to a cell style.
#[derive(Clone, Debug, PartialEq)]
pub struct NumberFormat {
    /// Format id (built-in ids are below 164)
    pub id: u32,
    /// Format code, e.g. `0.00` or `yyyy-mm-dd`
    pub code: String,
}

/// First id available to custom formats in an XLSX style sheet.
pub const FIRST_CUSTOM_FORMAT_ID: u32 = 164;

impl Default for NumberFormat {
    fn default() -> Self {
        Self::general()
    }
}

impl NumberFormat {
    pub fn general() -> Self {
        NumberFormat {
            id: 0,
            code: "General".to_owned(),
        }
    }

    /// Built-in format by id. Ids without a known code render as General.
    pub fn builtin(id: u32) -> Self {
        let code = match id {
            1 => "0",
            2 => "0.00",
            3 => "#,##0",
            4 => "#,##0.00",
            9 => "0%",
            10 => "0.00%",
            11 => "0.00E+00",
            12 => "# ?/?",
            13 => "# ??/??",
            14 => "mm-dd-yy",
            15 => "d-mmm-yy",
            16 => "d-mmm",
            17 => "mmm-yy",
            18 => "h:mm AM/PM",
            19 => "h:mm:ss AM/PM",
            20 => "h:mm",
            21 => "h:mm:ss",
            22 => "m/d/yy h:mm",
            37 => "#,##0 ;(#,##0)",
            38 => "#,##0 ;[Red](#,##0)",
            39 => "#,##0.00;(#,##0.00)",
            40 => "#,##0.00;[Red](#,##0.00)",
            45 => "mm:ss",
            46 => "[h]:mm:ss",
            47 => "mmss.0",
            48 => "##0.0E+0",
            49 => "@",
            _ => "General",
        };
        NumberFormat {
            id,
            code: code.to_owned(),
        }
    }

    pub fn custom(id: u32, code: &str) -> Self {
        NumberFormat {
            id,
            code: code.to_owned(),
        }
    }

    pub fn is_general(&self) -> bool {
        self.code.is_empty() || self.code.eq_ignore_ascii_case("General")
    }

    /// Whether the format renders numbers as dates or times.
    /// Decided from the format itself, never from the value being formatted.
    pub fn is_date_time(&self) -> bool {
        match self.id {
            14..=22 | 45..=47 => true,
            _ if self.id < FIRST_CUSTOM_FORMAT_ID && self.code == Self::builtin(self.id).code => false,
            _ => is_date_time_code(&self.code),
        }
    }

    /// Renders a plain number the way the format displays it.
    pub fn format(&self, value: f64) -> String {
        if self.is_general() || self.code == "@" {
            return format_general(value);
        }
        let sections = split_sections(&self.code);
        match sections.get(1) {
            Some(negative) if value < 0.0 => render_section(negative, -value, false),
            _ => render_section(sections[0], value, true),
        }
    }
}

/// Scans a format code for date or time tokens, skipping quoted literals,
/// escaped characters and bracketed colour/condition sections.
fn is_date_time_code(format: &str) -> bool {
    let mut is_escaped = false;
    let mut is_literal = false;
    let mut is_bracket = false;
    for character in format.chars() {
        match character {
            _ if is_escaped => is_escaped = false,
            '_' | '\\' | '*' if !is_literal => is_escaped = true,

            '"' if is_literal => is_literal = false,
            '"' if !is_bracket => is_literal = true,

            ']' if is_bracket => is_bracket = false,
            '[' if !is_literal => is_bracket = true,
            // `[h]`, `[mm]` and `[ss]` are elapsed-time tokens
            'h' | 'H' | 'm' | 'M' | 's' | 'S' if is_bracket => return true,
            _ if is_literal || is_bracket => (),

            'Y' | 'y' | 'D' | 'd' | 'H' | 'h' | 'S' | 's' => return true,
            _ => (),
        }
    }
    false
}

/// Splits on `;` outside quoted literals and escapes.
fn split_sections(code: &str) -> Vec<&str> {
    let mut sections = Vec::new();
    let mut start = 0usize;
    let mut is_literal = false;
    let mut is_escaped = false;
    for (index, character) in code.char_indices() {
        match character {
            _ if is_escaped => is_escaped = false,
            '\\' => is_escaped = true,
            '"' => is_literal = !is_literal,
            ';' if !is_literal => {
                sections.push(&code[start..index]);
                start = index + 1;
            }
            _ => (),
        }
    }
    sections.push(&code[start..]);
    sections
}

/// Parsed shape of one numeric format section.
#[derive(Default, Debug)]
struct Section {
    prefix: String,
    suffix: String,
    integer_zeros: usize,
    decimals: usize,
    thousands: bool,
    scale: i32,
    percent: bool,
    exponent: Option<(usize, bool)>,
}

fn parse_section(code: &str) -> Section {
    let mut section = Section::default();
    let mut chars = code.chars().peekable();
    let mut seen_placeholder = false;
    let mut in_decimals = false;
    let mut in_exponent = false;
    let mut pending_commas = 0i32;
    let mut literal = String::new();

    let flush = |literal: &mut String, section: &mut Section, seen: bool| {
        if seen {
            section.suffix.push_str(literal);
        } else {
            section.prefix.push_str(literal);
        }
        literal.clear();
    };

    while let Some(character) = chars.next() {
        match character {
            '"' => {
                for quoted in chars.by_ref() {
                    if quoted == '"' {
                        break;
                    }
                    literal.push(quoted);
                }
            }
            '\\' => literal.extend(chars.next()),
            '_' => {
                chars.next();
                literal.push(' ');
            }
            '*' => {
                chars.next();
            }
            '[' => {
                for bracketed in chars.by_ref() {
                    if bracketed == ']' {
                        break;
                    }
                }
            }
            '0' | '#' | '?' => {
                if !literal.is_empty() && seen_placeholder && !in_exponent {
                    // literals between digit placeholders are kept in the suffix
                    flush(&mut literal, &mut section, true);
                } else if !seen_placeholder {
                    flush(&mut literal, &mut section, false);
                }
                seen_placeholder = true;
                if pending_commas > 0 {
                    section.thousands = true;
                    pending_commas = 0;
                }
                if let Some((digits, _)) = section.exponent.as_mut().filter(|_| in_exponent) {
                    *digits += 1;
                } else if in_decimals {
                    section.decimals += 1;
                } else if character == '0' {
                    section.integer_zeros += 1;
                }
            }
            '.' if !in_decimals && !in_exponent => {
                if !seen_placeholder {
                    flush(&mut literal, &mut section, false);
                }
                seen_placeholder = true;
                in_decimals = true;
            }
            ',' if seen_placeholder && !in_decimals && !in_exponent => pending_commas += 1,
            'E' | 'e' if seen_placeholder && matches!(chars.peek(), Some('+') | Some('-')) => {
                let show_plus = chars.next() == Some('+');
                section.exponent = Some((0, show_plus));
                in_exponent = true;
            }
            '%' => {
                section.percent = true;
                literal.push('%');
            }
            _ => literal.push(character),
        }
    }
    // trailing commas after the last placeholder scale by thousands
    section.scale = pending_commas;
    flush(&mut literal, &mut section, seen_placeholder);
    section
}

fn render_section(code: &str, value: f64, signed: bool) -> String {
    let section = parse_section(code);
    let mut value = value;
    if section.percent {
        value *= 100.0;
    }
    if section.scale > 0 {
        value /= 1000f64.powi(section.scale);
    }
    let negative = signed && value < 0.0;
    let magnitude = value.abs();

    let body = match section.exponent {
        Some((digits, show_plus)) => format_scientific(magnitude, section.decimals, digits.max(1), show_plus),
        None => {
            let fixed = format!("{:.*}", section.decimals, magnitude);
            let (integer, fraction) = fixed.split_once('.').unwrap_or((fixed.as_str(), ""));
            let integer = integer.trim_start_matches('0');
            let mut integer = format!("{:0>width$}", integer, width = section.integer_zeros);
            if section.thousands {
                integer = group_thousands(&integer);
            }
            if fraction.is_empty() {
                integer
            } else {
                format!("{integer}.{fraction}")
            }
        }
    };

    let sign = if negative && body.chars().any(|c| c.is_ascii_digit() && c != '0') {
        "-"
    } else {
        ""
    };
    format!("{sign}{}{body}{}", section.prefix, section.suffix)
}

fn group_thousands(integer: &str) -> String {
    let digits: Vec<char> = integer.chars().collect();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, digit) in digits.iter().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(*digit);
    }
    grouped
}

fn format_scientific(magnitude: f64, decimals: usize, exponent_digits: usize, show_plus: bool) -> String {
    let mut exponent = if magnitude == 0.0 {
        0
    } else {
        magnitude.log10().floor() as i32
    };
    let mut mantissa = format!("{:.*}", decimals, magnitude / 10f64.powi(exponent));
    // rounding may carry the mantissa to 10
    if mantissa.starts_with("10") {
        exponent += 1;
        mantissa = format!("{:.*}", decimals, magnitude / 10f64.powi(exponent));
    }
    let sign = if exponent < 0 {
        "-"
    } else if show_plus {
        "+"
    } else {
        ""
    };
    format!(
        "{mantissa}E{sign}{:0>width$}",
        exponent.unsigned_abs(),
        width = exponent_digits
    )
}

/// Excel's General format: up to ten significant digits, scientific
/// notation for very large or very small magnitudes.
pub fn format_general(value: f64) -> String {
    let magnitude = value.abs();
    if magnitude == 0.0 {
        return "0".to_owned();
    }
    if magnitude >= 1e11 || magnitude < 1e-9 {
        let scientific = format_scientific(magnitude, 5, 2, true);
        let (mantissa, exponent) = scientific.split_once('E').unwrap_or((scientific.as_str(), ""));
        let mantissa = trim_fraction(mantissa);
        let sign = if value < 0.0 { "-" } else { "" };
        return format!("{sign}{mantissa}E{exponent}");
    }
    let exponent = magnitude.log10().floor() as i32;
    let decimals = (9 - exponent).clamp(0, 30) as usize;
    let fixed = format!("{:.*}", decimals, value);
    trim_fraction(&fixed).to_owned()
}

fn trim_fraction(number: &str) -> &str {
    if number.contains('.') {
        number.trim_end_matches('0').trim_end_matches('.')
    } else {
        number
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_date_time_formats() {
        assert!(NumberFormat::builtin(14).is_date_time());
        assert!(NumberFormat::builtin(22).is_date_time());
        assert!(NumberFormat::builtin(46).is_date_time());
        assert!(!NumberFormat::builtin(2).is_date_time());
        assert!(!NumberFormat::builtin(49).is_date_time());
        assert!(!NumberFormat::general().is_date_time());

        assert!(NumberFormat::custom(164, "yyyy-mm-dd").is_date_time());
        assert!(NumberFormat::custom(165, "hh:mm").is_date_time());
        assert!(NumberFormat::custom(166, "[h]:mm").is_date_time());
        assert!(!NumberFormat::custom(167, "0.00\" days\"").is_date_time());
        assert!(!NumberFormat::custom(168, "[Red]#,##0").is_date_time());
        assert!(!NumberFormat::custom(169, "#,##0_);\\(#,##0\\)").is_date_time());
    }

    #[test]
    fn formats_general() {
        assert_eq!(format_general(3.0), "3");
        assert_eq!(format_general(-42.0), "-42");
        assert_eq!(format_general(1234.5678), "1234.5678");
        assert_eq!(format_general(0.1 + 0.2), "0.3");
        assert_eq!(format_general(123456789012.0), "1.23457E+11");
        assert_eq!(format_general(0.0), "0");
    }

    #[test]
    fn formats_fixed_and_grouped() {
        assert_eq!(NumberFormat::builtin(1).format(3.4), "3");
        assert_eq!(NumberFormat::builtin(2).format(3.456), "3.46");
        assert_eq!(NumberFormat::builtin(3).format(1234567.0), "1,234,567");
        assert_eq!(NumberFormat::builtin(4).format(-1234.5), "-1,234.50");
        assert_eq!(NumberFormat::builtin(2).format(0.004), "0.00");
        assert_eq!(NumberFormat::custom(170, "0.0").format(3.0), "3.0");
    }

    #[test]
    fn formats_percent_scientific_and_literals() {
        assert_eq!(NumberFormat::builtin(9).format(0.256), "26%");
        assert_eq!(NumberFormat::builtin(10).format(0.256), "25.60%");
        assert_eq!(NumberFormat::builtin(11).format(12345.0), "1.23E+04");
        assert_eq!(NumberFormat::builtin(11).format(0.00012), "1.20E-04");
        assert_eq!(NumberFormat::custom(171, "\"$\"#,##0.00").format(1500.0), "$1,500.00");
        assert_eq!(NumberFormat::custom(172, "0.00\" kg\"").format(2.5), "2.50 kg");
        assert_eq!(NumberFormat::builtin(39).format(-12.5), "(12.50)");
        assert_eq!(NumberFormat::custom(173, "#,##0,").format(1_234_567.0), "1,235");
    }
}
