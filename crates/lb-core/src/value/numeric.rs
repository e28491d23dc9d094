/// Number parsed out of a string operand.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Long(i64),
    Double(f64),
}

impl Number {
    pub fn as_double(self) -> f64 {
        match self {
            Number::Long(l) => l as f64,
            Number::Double(d) => d,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericForm {
    /// The whole string (modulo surrounding whitespace) is a number.
    Whole,
    /// A number followed by trailing garbage, e.g. `"12abc"`.
    Leading,
    /// No numeric prefix at all; the value is zero.
    NotNumeric,
}

/// Parses the numeric prefix of `s` the way the hosted language coerces
/// strings in arithmetic context.
pub fn parse_numeric(s: &str) -> (Number, NumericForm) {
    let bytes = s.as_bytes();
    let mut pos = 0;
    while pos < bytes.len() && matches!(bytes[pos], b' ' | b'\t' | b'\n' | b'\r' | b'\x0b' | b'\x0c')
    {
        pos += 1;
    }
    let start = pos;
    if pos < bytes.len() && matches!(bytes[pos], b'+' | b'-') {
        pos += 1;
    }
    let int_digits_start = pos;
    while pos < bytes.len() && bytes[pos].is_ascii_digit() {
        pos += 1;
    }
    let mut int_digits = pos - int_digits_start;
    let mut is_double = false;
    if pos < bytes.len() && bytes[pos] == b'.' {
        let frac_start = pos + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        if int_digits > 0 || frac_end > frac_start {
            is_double = true;
            int_digits += frac_end - frac_start;
            pos = frac_end;
        }
    }
    if int_digits == 0 {
        return (Number::Long(0), NumericForm::NotNumeric);
    }
    if pos < bytes.len() && matches!(bytes[pos], b'e' | b'E') {
        let mut exp = pos + 1;
        if exp < bytes.len() && matches!(bytes[exp], b'+' | b'-') {
            exp += 1;
        }
        let exp_digits = exp;
        while exp < bytes.len() && bytes[exp].is_ascii_digit() {
            exp += 1;
        }
        if exp > exp_digits {
            is_double = true;
            pos = exp;
        }
    }
    let literal = &s[start..pos];
    let number = if is_double {
        Number::Double(literal.parse::<f64>().unwrap_or(0.0))
    } else {
        match literal.parse::<i64>() {
            Ok(l) => Number::Long(l),
            // integer overflow falls back to a double
            Err(_) => Number::Double(literal.parse::<f64>().unwrap_or(0.0)),
        }
    };
    let rest = &s[pos..];
    let form = if rest.trim_matches(|c: char| c.is_ascii_whitespace()).is_empty() {
        NumericForm::Whole
    } else {
        NumericForm::Leading
    };
    (number, form)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_whole_and_leading_numbers() {
        assert_eq!(parse_numeric(" 42 "), (Number::Long(42), NumericForm::Whole));
        assert_eq!(parse_numeric("-1.5e3"), (Number::Double(-1500.0), NumericForm::Whole));
        assert_eq!(parse_numeric("12abc"), (Number::Long(12), NumericForm::Leading));
        assert_eq!(parse_numeric(".5"), (Number::Double(0.5), NumericForm::Whole));
        assert_eq!(parse_numeric("abc"), (Number::Long(0), NumericForm::NotNumeric));
        assert_eq!(parse_numeric(""), (Number::Long(0), NumericForm::NotNumeric));
    }

    #[test]
    fn integer_overflow_becomes_double() {
        let (number, form) = parse_numeric("99999999999999999999");
        assert_eq!(form, NumericForm::Whole);
        assert!(matches!(number, Number::Double(_)));
    }
}
