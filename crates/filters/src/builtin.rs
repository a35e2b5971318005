//! Value validators behind the non-URL built-in filters.
//!
//! Each function returns the accepted (possibly canonicalized) value or
//! `None` when the value is rejected.

pub(crate) fn int(value: &str) -> Option<i64> {
    let trimmed = value.trim();
    let digits = trimmed
        .strip_prefix(['-', '+'])
        .unwrap_or(trimmed);
    let canonical_digits = !digits.is_empty()
        && digits.bytes().all(|b| b.is_ascii_digit())
        && (digits == "0" || !digits.starts_with('0'));
    if !canonical_digits {
        return None;
    }
    trimmed.parse::<i64>().ok()
}

pub(crate) fn uint(value: &str) -> Option<u64> {
    let n = int(value)?;
    u64::try_from(n).ok()
}

pub(crate) fn float(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    let body = trimmed.strip_prefix(['-', '+']).unwrap_or(trimmed);
    let (mantissa, exponent) = match body.find(['e', 'E']) {
        Some(i) => (&body[..i], Some(&body[i + 1..])),
        None => (body, None),
    };
    let (int_part, frac_part) = match mantissa.split_once('.') {
        Some((i, f)) => (i, f),
        None => (mantissa, ""),
    };
    let digits_only = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if (int_part.is_empty() && frac_part.is_empty()) || !digits_only(int_part) || !digits_only(frac_part) {
        return None;
    }
    if let Some(exp) = exponent {
        let exp_digits = exp.strip_prefix(['-', '+']).unwrap_or(exp);
        if exp_digits.is_empty() || !digits_only(exp_digits) {
            return None;
        }
    }
    trimmed.parse::<f64>().ok().filter(|f| f.is_finite())
}

pub(crate) fn number(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
}

pub(crate) fn identifier(value: &str) -> bool {
    !value.is_empty()
        && value
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

pub(crate) fn alnum(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_alphanumeric())
}

pub(crate) fn simple_text(value: &str) -> bool {
    !value.is_empty()
        && value
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b' ' | b'+' | b',' | b'.' | b'_'))
}

/// `#rgb` through `#rrggbb` hex notation, or a bare color name.
pub(crate) fn color(value: &str) -> bool {
    match value.strip_prefix('#') {
        Some(hex) => (3..=6).contains(&hex.len()) && hex.bytes().all(|b| b.is_ascii_hexdigit()),
        None => !value.is_empty() && value.bytes().all(|b| b.is_ascii_alphabetic()),
    }
}

pub(crate) fn email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    let local_ok = !local.is_empty()
        && local.len() <= 64
        && !local.starts_with('.')
        && !local.ends_with('.')
        && !local.contains("..")
        && local
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"!#$%&'*+/=?^_`{|}~.-".contains(&b));
    let labels: Vec<&str> = domain.split('.').collect();
    let domain_ok = labels.len() >= 2
        && labels.iter().all(|label| {
            !label.is_empty()
                && label.len() <= 63
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
        });
    local_ok && domain_ok
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_accepts_canonical_forms() {
        assert_eq!(int("42"), Some(42));
        assert_eq!(int(" -7 "), Some(-7));
        assert_eq!(int("+5"), Some(5));
        assert_eq!(int("0"), Some(0));
    }

    #[test]
    fn int_rejects_leading_zeros_and_junk() {
        for bad in ["012", "", "-", "1.5", "1e3", "12a", "99999999999999999999"] {
            assert_eq!(int(bad), None, "{bad}");
        }
    }

    #[test]
    fn uint_rejects_negative() {
        assert_eq!(uint("3"), Some(3));
        assert_eq!(uint("-3"), None);
    }

    #[test]
    fn float_forms() {
        assert_eq!(float("1.5"), Some(1.5));
        assert_eq!(float("-.5"), Some(-0.5));
        assert_eq!(float("2."), Some(2.0));
        assert_eq!(float("1e3"), Some(1000.0));
        for bad in ["inf", "NaN", ".", "1e", "e5", "1.2.3", ""] {
            assert_eq!(float(bad), None, "{bad}");
        }
    }

    #[test]
    fn character_class_filters() {
        assert!(number("0123"));
        assert!(!number("12 3"));
        assert!(identifier("my-id_2"));
        assert!(!identifier("my id"));
        assert!(alnum("abc123"));
        assert!(!alnum("abc-123"));
        assert!(simple_text("Hello, world 1.0"));
        assert!(!simple_text("<b>"));
    }

    #[test]
    fn color_hex_and_names() {
        assert!(color("#fff"));
        assert!(color("#A0b1C2"));
        assert!(color("red"));
        assert!(!color("#ff"));
        assert!(!color("#1234567"));
        assert!(!color("red;background:url(x)"));
    }

    #[test]
    fn email_shapes() {
        assert!(email("user.name+tag@example.co.uk"));
        assert!(!email("user@localhost"));
        assert!(!email("@example.com"));
        assert!(!email("a..b@example.com"));
        assert!(!email("a@-example.com"));
        assert!(!email("a@b@example.com"));
    }
}
