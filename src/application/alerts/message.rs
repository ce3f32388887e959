use crate::domain::alerts::{AlertDirection, RsiAlert};
use rust_decimal::{Decimal, RoundingStrategy};
use std::fmt::Write;

fn emoji(direction: AlertDirection) -> &'static str {
    match direction {
        AlertDirection::Overbought => "📈",
        AlertDirection::Oversold => "📉",
    }
}

/// Renders an alert as Telegram HTML
pub fn format_alert(alert: &RsiAlert) -> String {
    let price = alert
        .last_close
        .round_dp_with_strategy(4, RoundingStrategy::MidpointAwayFromZero);

    let mut message = format!(
        "{} <b>RSI Simple Alert - {}</b>\n\n",
        emoji(alert.direction),
        alert.direction
    );
    let _ = writeln!(message, "<b>Symbol:</b> {}", alert.symbol);
    let _ = writeln!(message, "<b>RSI Value:</b> {:.2}", alert.rsi);
    let _ = writeln!(message, "<b>Current Price:</b> ${:.4}", price);
    if let Some(volume) = alert.volume_24h {
        let _ = writeln!(
            message,
            "<b>24h Volume:</b> ${} USDT",
            group_thousands(volume)
        );
    }
    let _ = write!(
        message,
        "<b>Time:</b> {}",
        alert.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
    );
    message
}

/// Whole-number rendering with comma separators ("30,000,000")
pub fn group_thousands(value: Decimal) -> String {
    let rounded = value.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    let digits = rounded.abs().trunc().to_string();

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if rounded.is_sign_negative() && !rounded.is_zero() {
        grouped.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn alert(direction: AlertDirection, volume_24h: Option<Decimal>) -> RsiAlert {
        RsiAlert {
            symbol: "BTCUSDT".to_string(),
            direction,
            rsi: 71.23456,
            last_close: dec!(64250.5),
            volume_24h,
            timestamp: Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap(),
        }
    }

    #[test]
    fn test_overbought_message_layout() {
        let message = format_alert(&alert(AlertDirection::Overbought, Some(dec!(30000000.4))));
        assert_eq!(
            message,
            "📈 <b>RSI Simple Alert - Overbought</b>\n\n\
             <b>Symbol:</b> BTCUSDT\n\
             <b>RSI Value:</b> 71.23\n\
             <b>Current Price:</b> $64250.5000\n\
             <b>24h Volume:</b> $30,000,000 USDT\n\
             <b>Time:</b> 2024-03-09 14:05:07 UTC"
        );
    }

    #[test]
    fn test_oversold_without_volume_omits_line() {
        let message = format_alert(&alert(AlertDirection::Oversold, None));
        assert!(message.starts_with("📉 <b>RSI Simple Alert - Oversold</b>"));
        assert!(!message.contains("24h Volume"));
    }

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands(dec!(0)), "0");
        assert_eq!(group_thousands(dec!(999)), "999");
        assert_eq!(group_thousands(dec!(1000)), "1,000");
        assert_eq!(group_thousands(dec!(1234567.5)), "1,234,568");
        assert_eq!(group_thousands(dec!(-20000000)), "-20,000,000");
    }
}
