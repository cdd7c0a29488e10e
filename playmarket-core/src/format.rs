//! Display helpers for play-cash amounts and share prices

use rust_decimal::Decimal;

/// Exact dollar value of an amount of cents
pub fn to_dollars(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

/// Format an amount of cents as dollars, e.g. `123456` -> `$1,234.56`
pub fn format_cash(cents: i64) -> String {
    let dollars = to_dollars(cents).abs();
    let text = format!("{:.2}", dollars);
    let (whole, fraction) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if cents < 0 { "-" } else { "" };
    format!("{}${}.{}", sign, grouped, fraction)
}

/// Format a share price in cents, e.g. `55` -> `55¢`
pub fn format_price(cents: i64) -> String {
    format!("{}¢", cents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_to_dollars() {
        assert_eq!(to_dollars(450), dec!(4.50));
        assert_eq!(to_dollars(-1), dec!(-0.01));
    }

    #[test]
    fn test_format_cash() {
        assert_eq!(format_cash(0), "$0.00");
        assert_eq!(format_cash(450), "$4.50");
        assert_eq!(format_cash(100_000), "$1,000.00");
        assert_eq!(format_cash(123_456_789), "$1,234,567.89");
        assert_eq!(format_cash(-550), "-$5.50");
    }

    #[test]
    fn test_format_price() {
        assert_eq!(format_price(55), "55¢");
    }
}
