//! Number parsing for question text: ASCII digits and Chinese numerals
//! (`十`, `二十五`, `一百零五`, `两千`).

/// Parse an unsigned count written with ASCII digits or Chinese numerals
pub fn parse_count(text: &str) -> Option<u64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if text.chars().all(|c| c.is_ascii_digit()) {
        return text.parse().ok();
    }
    parse_chinese(text)
}

fn digit_value(c: char) -> Option<u64> {
    match c {
        '零' | '〇' => Some(0),
        '一' => Some(1),
        '二' | '两' => Some(2),
        '三' => Some(3),
        '四' => Some(4),
        '五' => Some(5),
        '六' => Some(6),
        '七' => Some(7),
        '八' => Some(8),
        '九' => Some(9),
        _ => None,
    }
}

fn unit_value(c: char) -> Option<u64> {
    match c {
        '十' => Some(10),
        '百' => Some(100),
        '千' => Some(1_000),
        _ => None,
    }
}

fn parse_chinese(text: &str) -> Option<u64> {
    let mut total: u64 = 0;
    let mut section: u64 = 0;
    let mut current: Option<u64> = None;

    for c in text.chars() {
        if let Some(d) = digit_value(c) {
            current = Some(d);
        } else if let Some(unit) = unit_value(c) {
            // a bare 十 at the start means 1×10
            section = section.checked_add(current.unwrap_or(1) * unit)?;
            current = None;
        } else if c == '万' {
            section = section.checked_add(current.unwrap_or(0))?;
            total = total.checked_add(section.max(1).checked_mul(10_000)?)?;
            section = 0;
            current = None;
        } else {
            return None;
        }
    }

    total.checked_add(section)?.checked_add(current.unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_digits() {
        assert_eq!(parse_count("10"), Some(10));
        assert_eq!(parse_count(" 7 "), Some(7));
        assert_eq!(parse_count(""), None);
    }

    #[test]
    fn test_chinese_numerals() {
        assert_eq!(parse_count("十"), Some(10));
        assert_eq!(parse_count("十二"), Some(12));
        assert_eq!(parse_count("二十"), Some(20));
        assert_eq!(parse_count("三"), Some(3));
        assert_eq!(parse_count("两"), Some(2));
        assert_eq!(parse_count("一百零五"), Some(105));
        assert_eq!(parse_count("两千"), Some(2000));
        assert_eq!(parse_count("三万"), Some(30_000));
    }

    #[test]
    fn test_rejects_other_text() {
        assert_eq!(parse_count("几"), None);
        assert_eq!(parse_count("10条"), None);
    }

    #[test]
    fn test_out_of_range_is_none() {
        assert_eq!(parse_count("99999999999999999999999"), None);
    }
}
