//! 필드 값 포맷 모듈: 프로토콜 원시 값을 선언된 필드 타입에 맞춰 사람이 읽는 형태로 변환합니다.
//!
//! 날짜/시간 값은 epoch 밀리초 문자열로 전달되며, 결과를 결정적으로 만들기 위해 UTC 기준으로 포맷합니다.
//!
//! - [`format_field_value`]: 타입별 분기 진입점
//! - [`format_date`], [`format_time_of_day`], [`format_duration`], [`format_currency`], [`format_percent`]
//! - [`date_to_millis`]: `mm-dd-yyyy` → epoch 밀리초

use chrono::{DateTime, NaiveDate};

use crate::types::FieldType;

/// 날짜 기본 포맷
pub const DATE_FORMAT: &str = "%m-%d-%Y";

/// 날짜+시간 포맷
pub const TIMESTAMP_FORMAT: &str = "%m-%d-%Y %I:%M %p";

/// 시각 포맷
pub const TIME_OF_DAY_FORMAT: &str = "%I:%M %p";

/// 기간 표시 단위
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DurationUnit {
    Days,
    #[default]
    Hours,
    Minutes,
}

/// 통화 기호 위치 (`currency_format` 속성)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CurrencyPlacement {
    /// `"0"`: 값 앞
    #[default]
    Before,
    /// `"1"`: 부호 뒤, 숫자 앞
    AfterSign,
    /// `"2"`: 값 뒤
    After,
}

impl CurrencyPlacement {
    pub fn from_property(value: &str) -> Self {
        match value {
            "1" => CurrencyPlacement::AfterSign,
            "2" => CurrencyPlacement::After,
            _ => CurrencyPlacement::Before,
        }
    }
}

/// 필드별 포맷 옵션
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FormatOptions {
    pub duration_unit: DurationUnit,
    pub currency_symbol: Option<String>,
    pub currency_placement: CurrencyPlacement,
}

/// 원시 값을 필드 타입에 맞춰 포맷합니다.
///
/// 날짜/시간, 기간, 통화, 백분율 이외의 타입은 그대로 반환합니다.
///
/// # 예시
///
/// ```
/// use qdbapi::format::{format_field_value, FormatOptions};
/// use qdbapi::types::FieldType;
///
/// let opts = FormatOptions::default();
/// assert_eq!(format_field_value("1234567890000", &FieldType::Date, &opts), "02-13-2009");
/// assert_eq!(format_field_value("0.25", &FieldType::Percent, &opts), "25");
/// assert_eq!(format_field_value("hello", &FieldType::Text, &opts), "hello");
/// ```
pub fn format_field_value(value: &str, field_type: &FieldType, options: &FormatOptions) -> String {
    match field_type {
        FieldType::Date => format_date(value, DATE_FORMAT),
        FieldType::Timestamp => format_date(value, TIMESTAMP_FORMAT),
        FieldType::TimeOfDay => format_time_of_day(value),
        FieldType::Duration => format_duration(value, options.duration_unit),
        FieldType::Currency => format_currency(
            value,
            options.currency_symbol.as_deref(),
            options.currency_placement,
        ),
        FieldType::Percent => format_percent(value),
        _ => value.to_string(),
    }
}

/// epoch 밀리초 문자열을 `fmt` 형식의 날짜로 포맷합니다.
///
/// 빈 값은 빈 문자열, 숫자가 아닌 값은 그대로 반환합니다.
pub fn format_date(millis: &str, fmt: &str) -> String {
    let millis = millis.trim();
    if millis.is_empty() {
        return String::new();
    }
    match millis.parse::<i64>().ok().and_then(DateTime::from_timestamp_millis) {
        Some(time) => time.format(fmt).to_string(),
        None => millis.to_string(),
    }
}

/// 자정 기준 밀리초를 `%I:%M %p` 시각으로 포맷합니다.
pub fn format_time_of_day(millis: &str) -> String {
    format_date(millis, TIME_OF_DAY_FORMAT)
}

/// 밀리초 기간을 정수 일/시간/분으로 변환합니다 (소수점 버림).
pub fn format_duration(millis: &str, unit: DurationUnit) -> String {
    let millis = millis.trim();
    if millis.is_empty() {
        return String::new();
    }
    let Ok(ms) = millis.parse::<i64>() else {
        return millis.to_string();
    };
    let minutes = ms / 1000 / 60;
    let value = match unit {
        DurationUnit::Minutes => minutes,
        DurationUnit::Hours => minutes / 60,
        DurationUnit::Days => minutes / 60 / 24,
    };
    value.to_string()
}

/// 통화 값을 포맷합니다.
///
/// 소수점이 없으면 `.00`을 붙이고, 통화 기호가 있으면 `placement`에 따라 배치합니다.
///
/// # 예시
///
/// ```
/// use qdbapi::format::{format_currency, CurrencyPlacement};
///
/// assert_eq!(format_currency("12", Some("$"), CurrencyPlacement::Before), "$12.00");
/// assert_eq!(format_currency("-3.5", Some("$"), CurrencyPlacement::AfterSign), "-$3.5");
/// assert_eq!(format_currency("7", Some("€"), CurrencyPlacement::After), "7.00€");
/// ```
pub fn format_currency(value: &str, symbol: Option<&str>, placement: CurrencyPlacement) -> String {
    let mut amount = if value.is_empty() {
        "0.00".to_string()
    } else {
        value.to_string()
    };
    if !amount.contains('.') {
        amount.push_str(".00");
    }

    let Some(symbol) = symbol else {
        return amount;
    };
    match placement {
        CurrencyPlacement::Before => format!("{symbol}{amount}"),
        CurrencyPlacement::After => format!("{amount}{symbol}"),
        CurrencyPlacement::AfterSign => match amount.chars().next() {
            Some(sign @ ('-' | '+')) => format!("{sign}{symbol}{}", &amount[1..]),
            _ => format!("{symbol}{amount}"),
        },
    }
}

/// 0–1 비율 값을 백분율로 포맷합니다.
///
/// 소수부가 0이면 정수만, 아니면 소수 둘째 자리까지 (버림) 표시합니다.
pub fn format_percent(value: &str) -> String {
    let ratio = value.trim().parse::<f64>().unwrap_or(0.0);
    let percent = (ratio * 100.0).to_string();
    match percent.split_once('.') {
        Some((int, fraction)) if fraction.bytes().any(|b| b != b'0') => {
            let digits = &fraction[..fraction.len().min(2)];
            format!("{int}.{digits}")
        }
        Some((int, _)) => int.to_string(),
        None => percent,
    }
}

/// `mm-dd-yyyy` 날짜를 UTC 자정의 epoch 밀리초로 변환합니다.
///
/// 형식이 맞지 않거나 존재하지 않는 날짜면 `None`을 반환합니다.
pub fn date_to_millis(date: &str) -> Option<i64> {
    let parsed = NaiveDate::parse_from_str(date.trim(), DATE_FORMAT).ok()?;
    Some(parsed.and_hms_opt(0, 0, 0)?.and_utc().timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_date() {
        assert_eq!(format_date("1234567890000", DATE_FORMAT), "02-13-2009");
        assert_eq!(format_date("", DATE_FORMAT), "");
        assert_eq!(format_date("soon", DATE_FORMAT), "soon");
    }

    #[test]
    fn test_format_timestamp() {
        let opts = FormatOptions::default();
        assert_eq!(
            format_field_value("1234567890000", &FieldType::Timestamp, &opts),
            "02-13-2009 11:31 PM"
        );
    }

    #[test]
    fn test_format_time_of_day() {
        // 13:45 UTC
        assert_eq!(format_time_of_day("49500000"), "01:45 PM");
        assert_eq!(format_time_of_day("0"), "12:00 AM");
    }

    #[test]
    fn test_format_duration_units() {
        let ms = (2 * 24 * 60 + 90) * 60 * 1000; // 2일 1시간 30분
        let ms = ms.to_string();
        assert_eq!(format_duration(&ms, DurationUnit::Days), "2");
        assert_eq!(format_duration(&ms, DurationUnit::Hours), "49");
        assert_eq!(format_duration(&ms, DurationUnit::Minutes), "2970");
        assert_eq!(format_duration("", DurationUnit::Hours), "");
    }

    #[test]
    fn test_format_currency_without_symbol() {
        assert_eq!(format_currency("5", None, CurrencyPlacement::Before), "5.00");
        assert_eq!(format_currency("5.5", None, CurrencyPlacement::Before), "5.5");
        assert_eq!(format_currency("", None, CurrencyPlacement::Before), "0.00");
    }

    #[test]
    fn test_format_currency_after_sign_positive() {
        assert_eq!(
            format_currency("+2", Some("$"), CurrencyPlacement::AfterSign),
            "+$2.00"
        );
        assert_eq!(
            format_currency("2", Some("$"), CurrencyPlacement::AfterSign),
            "$2.00"
        );
    }

    #[test]
    fn test_currency_placement_from_property() {
        assert_eq!(CurrencyPlacement::from_property("1"), CurrencyPlacement::AfterSign);
        assert_eq!(CurrencyPlacement::from_property("2"), CurrencyPlacement::After);
        assert_eq!(CurrencyPlacement::from_property(""), CurrencyPlacement::Before);
    }

    #[test]
    fn test_format_percent() {
        assert_eq!(format_percent("0.5"), "50");
        assert_eq!(format_percent("0.125"), "12.5");
        assert_eq!(format_percent("0.12345"), "12.34");
        assert_eq!(format_percent(""), "0");
        assert_eq!(format_percent("1"), "100");
    }

    #[test]
    fn test_date_to_millis() {
        assert_eq!(date_to_millis("02-13-2009"), Some(1_234_483_200_000));
        assert_eq!(date_to_millis("2009-02-13"), None);
        assert_eq!(date_to_millis("02-30-2009"), None);
    }

    #[test]
    fn test_date_round_trip_through_formatter() {
        let ms = date_to_millis("07-04-2021").unwrap();
        assert_eq!(format_date(&ms.to_string(), DATE_FORMAT), "07-04-2021");
    }
}
