use chrono::{DateTime, Datelike, Utc};
use uuid::Uuid;

const BASE36: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

fn to_base36(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while value > 0 {
        digits.push(BASE36[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();
    String::from_utf8_lossy(&digits).into_owned()
}

/// `{PREFIX}-{year}-{last 4 base36 digits of the millisecond clock}{2 random digits}`
fn reference_code(prefix: &str, now: DateTime<Utc>) -> String {
    let clock = to_base36(now.timestamp_millis().max(0) as u64);
    let tail = &clock[clock.len().saturating_sub(4)..];
    let suffix = Uuid::new_v4().as_u128() % 100;
    format!("{}-{}-{}{:02}", prefix, now.year(), tail, suffix)
}

pub fn repair_code(now: DateTime<Utc>) -> String {
    reference_code("REP", now)
}

pub fn invoice_number(now: DateTime<Utc>) -> String {
    reference_code("INV", now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn base36_uses_uppercase_digits() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "Z");
        assert_eq!(to_base36(36), "10");
        assert_eq!(to_base36(46_655), "ZZZ");
    }

    #[test]
    fn repair_code_has_year_clock_and_suffix() {
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 14, 30, 0).unwrap();
        let code = repair_code(now);
        let parts: Vec<&str> = code.split('-').collect();

        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "REP");
        assert_eq!(parts[1], "2024");
        assert_eq!(parts[2].len(), 6);
        assert!(parts[2][..4].chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
        assert!(parts[2][4..].chars().all(|c| c.is_ascii_digit()));

        let clock = to_base36(now.timestamp_millis() as u64);
        assert!(clock.ends_with(&parts[2][..4]));
    }

    #[test]
    fn invoice_numbers_share_the_shape() {
        let number = invoice_number(Utc::now());
        assert!(number.starts_with("INV-"));
        assert_eq!(number.len(), "INV-2024-ABCD12".len());
    }
}
