//! 텍스트 인코딩 유틸리티: XML 이스케이프, base32 식별자, 타임스탬프 변환
//!
//! ## 주요 함수
//!
//! - [`encode_xml`] / [`decode_xml`]: `& < > ' "` 다섯 문자의 엔티티 변환
//! - [`encode_xml_np`]: 비인쇄 문자까지 `&#NNN;`으로 이스케이프
//! - [`is_base32_id`]: 테이블/애플리케이션 ID 형태 판별
//! - [`decimal_to_base32`]: 정수 → base32 ID 문자열
//! - [`time_in_millis`] / [`now_millis`]: epoch 밀리초 변환
//! - [`split_separated`]: 따옴표를 인식하는 구분자 분할 (CSV 헤더 등)

use chrono::{DateTime, Utc};

/// 엔티티 변환 표. 인코딩은 앞에서부터, 디코딩은 역순으로 적용됩니다.
const XML_ENTITIES: [(char, &str); 5] = [
    ('&', "&amp;"),
    ('<', "&lt;"),
    ('>', "&gt;"),
    ('\'', "&apos;"),
    ('"', "&quot;"),
];

/// base32 ID 알파벳: 소문자 (`l`, `o` 제외) + 숫자 2–9
pub const BASE32_ALPHABET: &str = "abcdefghijkmnpqrstuvwxyz23456789";

/// XML 특수 문자를 엔티티로 변환합니다.
///
/// # 예시
///
/// ```
/// use qdbapi::encoding::encode_xml;
///
/// assert_eq!(encode_xml("Tom & \"Jerry\""), "Tom &amp; &quot;Jerry&quot;");
/// ```
pub fn encode_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match XML_ENTITIES.iter().find(|(ch, _)| *ch == c) {
            Some((_, entity)) => out.push_str(entity),
            None => out.push(c),
        }
    }
    out
}

/// [`encode_xml`] 후 안전 문자 집합 밖의 문자를 `&#NNN;` 형태로 추가 이스케이프합니다.
///
/// 안전 문자 집합: 영숫자, 공백, `;/?:@&=+$,-_.!~*'()#`
pub fn encode_xml_np(text: &str) -> String {
    let encoded = encode_xml(text);
    let mut out = String::with_capacity(encoded.len());
    for c in encoded.chars() {
        if c.is_ascii_alphanumeric() || " ;/?:@&=+$,-_.!~*'()#".contains(c) {
            out.push(c);
        } else {
            out.push_str(&format!("&#{:03};", c as u32));
        }
    }
    out
}

/// 엔티티와 2–3자리 숫자 문자 참조(`&#NN;`, `&#NNN;`)를 원래 문자로 되돌립니다.
///
/// 알 수 없는 `&...;` 시퀀스는 그대로 둡니다.
pub fn decode_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        match decode_entity(tail) {
            Some((c, consumed)) => {
                out.push(c);
                rest = &tail[consumed..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// `tail`의 시작 위치에서 엔티티 하나를 해석해 (문자, 소비한 바이트 수)를 반환합니다.
fn decode_entity(tail: &str) -> Option<(char, usize)> {
    for (c, entity) in XML_ENTITIES.iter().rev() {
        if tail.starts_with(entity) {
            return Some((*c, entity.len()));
        }
    }
    let digits = tail.strip_prefix("&#")?;
    let end = digits.find(';')?;
    let number = &digits[..end];
    if !(2..=3).contains(&number.len()) || !number.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let c = char::from_u32(number.parse().ok()?)?;
    Some((c, 2 + end + 1))
}

/// 문자열이 base32 형태의 테이블/애플리케이션 ID인지 확인합니다.
///
/// 빈 문자열은 ID가 아닙니다. 대소문자를 구분합니다.
///
/// # 예시
///
/// ```
/// use qdbapi::encoding::is_base32_id;
///
/// assert!(is_base32_id("bdb5rjd6h"));
/// assert!(!is_base32_id("Customers"));
/// assert!(!is_base32_id("hello")); // 'l', 'o'는 알파벳에 없음
/// ```
pub fn is_base32_id(text: &str) -> bool {
    !text.is_empty() && text.chars().all(|c| BASE32_ALPHABET.contains(c))
}

/// [`is_base32_id`]와 같습니다.
pub fn is_dbid(text: &str) -> bool {
    is_base32_id(text)
}

/// 정수를 base32 ID 문자열로 변환합니다.
pub fn decimal_to_base32(mut value: u64) -> String {
    let alphabet = BASE32_ALPHABET.as_bytes();
    if value == 0 {
        return (alphabet[0] as char).to_string();
    }
    let mut digits = Vec::new();
    while value > 0 {
        digits.push(alphabet[(value % 32) as usize] as char);
        value /= 32;
    }
    digits.iter().rev().collect()
}

/// UTC 시각을 epoch 밀리초로 변환합니다.
pub fn time_in_millis(time: DateTime<Utc>) -> i64 {
    time.timestamp_millis()
}

/// 현재 시각의 epoch 밀리초
pub fn now_millis() -> i64 {
    time_in_millis(Utc::now())
}

/// `;`로 구분된 사용자 목록을 분할합니다. 빈 항목은 버립니다.
pub fn list_user_to_vec(list: &str) -> Vec<String> {
    list.split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// 사용자 목록을 `;`로 결합합니다.
pub fn vec_to_list_user<S: AsRef<str>>(users: &[S]) -> String {
    users
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(";")
}

/// 한 줄을 구분자로 분할합니다.
///
/// 큰따옴표로 감싼 항목 안의 구분자는 분할하지 않으며, 항목 안의 `""`는 `"` 하나로 바뀝니다.
/// 줄 끝의 개행 문자는 무시합니다.
pub fn split_separated(line: &str, separator: char) -> Vec<String> {
    let line = line.trim_end_matches(['\r', '\n']);
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            c if c == separator && !in_quotes => fields.push(std::mem::take(&mut current)),
            c => current.push(c),
        }
    }
    fields.push(current);
    fields
}
