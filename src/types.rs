//! 클라이언트 전반에서 공유하는 타입 정의입니다.
//!
//! [`FieldType`], [`BaseType`], [`FieldValue`], [`Selector`], [`Record`],
//! [`FieldValues`] 등 스키마/조회/집계 모듈 전반에서 공유되는 타입을 정의합니다.

use std::fmt;

use regex::Regex;
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::constants::DEFAULT_CRITERIA;

/// 스키마에 선언된 필드 타입 (`field_type` 속성)
///
/// 알 수 없는 타입 문자열은 [`Other`](Self::Other)로 보존합니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldType {
    Text,
    /// 일반 숫자 (`float`)
    Float,
    Date,
    /// 날짜+시간 (`timestamp`, 라벨 `"date / time"`)
    Timestamp,
    TimeOfDay,
    /// 밀리초 단위 기간
    Duration,
    Currency,
    Percent,
    Rating,
    Checkbox,
    File,
    User,
    MultiUser,
    /// 관계(외래키) 필드
    Fkey,
    RecordId,
    Dblink,
    Email,
    Phone,
    Url,
    Formula,
    Lookup,
    ICalendarButton,
    Other(String),
}

impl FieldType {
    /// 프로토콜 표기 문자열
    pub fn as_str(&self) -> &str {
        match self {
            FieldType::Text => "text",
            FieldType::Float => "float",
            FieldType::Date => "date",
            FieldType::Timestamp => "timestamp",
            FieldType::TimeOfDay => "timeofday",
            FieldType::Duration => "duration",
            FieldType::Currency => "currency",
            FieldType::Percent => "percent",
            FieldType::Rating => "rating",
            FieldType::Checkbox => "checkbox",
            FieldType::File => "file",
            FieldType::User => "userid",
            FieldType::MultiUser => "multiuserid",
            FieldType::Fkey => "fkey",
            FieldType::RecordId => "recordid",
            FieldType::Dblink => "dblink",
            FieldType::Email => "email",
            FieldType::Phone => "phone",
            FieldType::Url => "url",
            FieldType::Formula => "formula",
            FieldType::Lookup => "lookup",
            FieldType::ICalendarButton => "icalendarbutton",
            FieldType::Other(other) => other,
        }
    }
}

impl From<&str> for FieldType {
    fn from(value: &str) -> Self {
        match value {
            "text" => FieldType::Text,
            "float" => FieldType::Float,
            "date" => FieldType::Date,
            "timestamp" | "date / time" => FieldType::Timestamp,
            "timeofday" => FieldType::TimeOfDay,
            "duration" => FieldType::Duration,
            "currency" => FieldType::Currency,
            "percent" => FieldType::Percent,
            "rating" => FieldType::Rating,
            "checkbox" => FieldType::Checkbox,
            "file" => FieldType::File,
            "userid" | "user" => FieldType::User,
            "multiuserid" => FieldType::MultiUser,
            "fkey" => FieldType::Fkey,
            "recordid" => FieldType::RecordId,
            "dblink" => FieldType::Dblink,
            "email" => FieldType::Email,
            "phone" => FieldType::Phone,
            "url" => FieldType::Url,
            "formula" => FieldType::Formula,
            "lookup" => FieldType::Lookup,
            "icalendarbutton" => FieldType::ICalendarButton,
            other => FieldType::Other(other.to_string()),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 필드 값의 저장 기본 타입 (`base_type` 속성)
///
/// 집계 시 숫자 변환 방식을 결정합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BaseType {
    Int32,
    Int64,
    Float,
    #[default]
    Text,
    Bool,
}

impl BaseType {
    /// 정수로 집계되는 타입인지 (int32, int64, bool)
    pub fn is_integer(self) -> bool {
        matches!(self, BaseType::Int32 | BaseType::Int64 | BaseType::Bool)
    }

    /// 숫자로 집계되는 타입인지
    pub fn is_numeric(self) -> bool {
        self.is_integer() || self == BaseType::Float
    }
}

impl From<&str> for BaseType {
    fn from(value: &str) -> Self {
        match value {
            "int32" => BaseType::Int32,
            "int64" => BaseType::Int64,
            "float" => BaseType::Float,
            "bool" => BaseType::Bool,
            _ => BaseType::Text,
        }
    }
}

/// 기본 타입에 따라 변환된 단일 필드 값
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Text(String),
    Int(i64),
    Float(f64),
}

impl FieldValue {
    /// 원시 문자열을 기본 타입에 맞춰 변환합니다.
    ///
    /// 빈 문자열은 [`Null`](Self::Null)이 됩니다. 숫자 타입은 관대하게 해석하며
    /// 해석할 수 없는 값은 0이 됩니다.
    ///
    /// # 예시
    ///
    /// ```
    /// use qdbapi::types::{BaseType, FieldValue};
    ///
    /// assert_eq!(FieldValue::coerce("12", BaseType::Int32), FieldValue::Int(12));
    /// assert_eq!(FieldValue::coerce("2.5", BaseType::Float), FieldValue::Float(2.5));
    /// assert_eq!(FieldValue::coerce("", BaseType::Float), FieldValue::Null);
    /// ```
    pub fn coerce(raw: &str, base_type: BaseType) -> Self {
        if raw.is_empty() {
            return FieldValue::Null;
        }
        let trimmed = raw.trim();
        match base_type {
            BaseType::Int32 | BaseType::Int64 | BaseType::Bool => {
                let value = trimmed
                    .parse::<i64>()
                    .or_else(|_| trimmed.parse::<f64>().map(|f| f as i64))
                    .unwrap_or(0);
                FieldValue::Int(value)
            }
            BaseType::Float => FieldValue::Float(trimmed.parse::<f64>().unwrap_or(0.0)),
            BaseType::Text => FieldValue::Text(raw.to_string()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// 숫자 값이면 f64로 반환합니다.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Int(i) => Some(*i as f64),
            FieldValue::Float(f) => Some(*f),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => Ok(()),
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Int(i) => write!(f, "{i}"),
            // NOTE: f64 Display prints integral values without ".0"
            FieldValue::Float(v) => write!(f, "{v}"),
        }
    }
}

/// 조회 대상 레코드 선택자
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Selector {
    /// 모든 레코드 ([`DEFAULT_CRITERIA`])
    #[default]
    All,
    /// 원시 criteria 문자열 (빈 문자열은 [`All`](Self::All)과 같음)
    Criteria(String),
    /// 서버에 저장된 리포트 ID (`qid`)
    ReportId(String),
    /// 서버에 저장된 리포트 이름 (`qname`)
    ReportName(String),
}

impl Selector {
    pub fn criteria(criteria: impl Into<String>) -> Self {
        Selector::Criteria(criteria.into())
    }

    /// 요청에 들어갈 (태그, 값) 쌍
    pub fn request_field(&self) -> (&'static str, &str) {
        match self {
            Selector::All => ("query", DEFAULT_CRITERIA),
            Selector::Criteria(c) if c.is_empty() => ("query", DEFAULT_CRITERIA),
            Selector::Criteria(c) => ("query", c),
            Selector::ReportId(id) => ("qid", id),
            Selector::ReportName(name) => ("qname", name),
        }
    }
}

/// 필드 이름 → 값의 순서 보존 레코드
///
/// 같은 이름으로 다시 넣으면 기존 값을 덮어씁니다.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Record {
    entries: Vec<(String, String)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// 값을 넣습니다. 이미 있는 이름이면 위치를 유지한 채 값만 바꿉니다.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// 다른 레코드의 값을 덮어씁니다 (이름 충돌 시 `other`가 이김).
    pub fn merge(&mut self, other: &Record) {
        for (name, value) in &other.entries {
            self.insert(name.clone(), value.clone());
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (name, value) in iter {
            record.insert(name, value);
        }
        record
    }
}

// NOTE: Serialized as a JSON object that keeps field order
impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// 필드 이름 → 값 목록 (열 단위) 매핑
///
/// 모든 열의 길이가 같고, 같은 인덱스의 값들이 한 레코드를 이룹니다.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FieldValues {
    columns: Vec<(String, Vec<String>)>,
}

impl FieldValues {
    /// 주어진 이름 순서로 빈 열을 만듭니다. 중복 이름은 한 번만 들어갑니다.
    pub fn with_names<S: AsRef<str>>(names: &[S]) -> Self {
        let mut values = FieldValues::default();
        for name in names {
            let name = name.as_ref();
            if values.column(name).is_none() {
                values.columns.push((name.to_string(), Vec::new()));
            }
        }
        values
    }

    /// 모든 열에 빈 값 한 행을 추가합니다.
    pub fn push_empty_row(&mut self) {
        for (_, column) in &mut self.columns {
            column.push(String::new());
        }
    }

    /// 마지막 행의 `name` 열 값을 바꿉니다.
    pub fn set_last(&mut self, name: &str, value: &str) {
        if let Some((_, column)) = self.columns.iter_mut().find(|(n, _)| n == name) {
            if let Some(last) = column.last_mut() {
                *last = value.to_string();
            }
        }
    }

    /// 레코드 하나를 행으로 추가합니다. 레코드에 없는 열은 빈 값이 됩니다.
    pub fn push_record(&mut self, record: &Record) {
        for (name, column) in &mut self.columns {
            column.push(record.get(name).unwrap_or_default().to_string());
        }
    }

    pub fn column(&self, name: &str) -> Option<&[String]> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, c)| c.as_slice())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(n, _)| n.as_str())
    }

    /// 행 수
    pub fn len(&self) -> usize {
        self.columns.first().map_or(0, |(_, c)| c.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `index` 행을 레코드로 만듭니다.
    pub fn row(&self, index: usize) -> Option<Record> {
        if index >= self.len() {
            return None;
        }
        Some(
            self.columns
                .iter()
                .map(|(n, c)| (n.clone(), c[index].clone()))
                .collect(),
        )
    }

    /// 행 단위로 레코드를 순회합니다.
    pub fn rows(&self) -> impl Iterator<Item = Record> + '_ {
        (0..self.len()).filter_map(|i| self.row(i))
    }
}

/// 레코드 필터 조건: `pattern`이 있으면 해당 필드 값이 정규식과 일치해야 함
#[derive(Debug, Clone)]
pub struct FieldFilter {
    pub name: String,
    pub pattern: Option<Regex>,
}

impl FieldFilter {
    /// 조건 없이 값만 가져올 필드
    pub fn field(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pattern: None,
        }
    }

    /// 정규식 조건이 있는 필드
    pub fn matching(name: impl Into<String>, pattern: Regex) -> Self {
        Self {
            name: name.into(),
            pattern: Some(pattern),
        }
    }

    pub fn accepts(&self, value: &str) -> bool {
        self.pattern.as_ref().is_none_or(|p| p.is_match(value))
    }
}

/// 중복 레코드 삭제 시 남길 레코드
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    /// 그룹의 첫 레코드를 남김
    KeepFirst,
    /// 그룹의 마지막 레코드를 남김
    #[default]
    KeepLast,
}
