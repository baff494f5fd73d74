//! 테이블 스키마 모델과 조회 함수
//!
//! `getSchema` 응답의 `table` 엘리먼트에서 필드, 리포트(쿼리), 자식 테이블 링크,
//! 애플리케이션 변수, 키 필드를 추출합니다.
//!
//! 필드 라벨 조회는 대소문자를 구분하지 않으며, 라벨이 중복되면 문서 순서상 첫 필드를 반환합니다.

use std::collections::{BTreeMap, HashMap};

use crate::constants::BUILT_IN_FIELD_LIMIT;
use crate::error::{QdbError, Result};
use crate::format::{CurrencyPlacement, FormatOptions};
use crate::types::{BaseType, FieldType};
use crate::xml::Element;

/// field id가 서버 예약(built-in) 필드인지 확인합니다 (`fid < 6`).
///
/// # 예시
///
/// ```
/// use qdbapi::schema::is_built_in_field;
///
/// assert!(is_built_in_field(3));
/// assert!(!is_built_in_field(6));
/// ```
pub fn is_built_in_field(fid: u32) -> bool {
    fid < BUILT_IN_FIELD_LIMIT
}

/// 필드 이름 목록의 대소문자 변환
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NameCase {
    #[default]
    AsIs,
    Lower,
    Upper,
}

/// 필드 정의
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    pub id: u32,
    pub label: String,
    pub field_type: FieldType,
    pub base_type: BaseType,
    /// `does_total`, `required`, `currency_symbol` 등 나머지 속성
    pub properties: BTreeMap<String, String>,
    /// 선택형 필드의 선택지 (문서 순서)
    pub choices: Vec<String>,
}

impl FieldDef {
    fn from_element(element: &Element) -> Option<Self> {
        let id = element.attr("id")?.parse().ok()?;
        let mut properties = BTreeMap::new();
        for (name, value) in &element.attributes {
            if !matches!(name.as_str(), "id" | "field_type" | "base_type") {
                properties.insert(name.clone(), value.clone());
            }
        }
        for child in &element.children {
            if child.name != "label" && child.name != "choices" {
                properties.insert(child.name.clone(), child.text_or_empty().to_string());
            }
        }
        let choices = element
            .child("choices")
            .map(|c| c.descendant_texts("choice"))
            .unwrap_or_default();

        Some(Self {
            id,
            label: element.child_text("label").unwrap_or_default().to_string(),
            field_type: FieldType::from(element.attr("field_type").unwrap_or_default()),
            base_type: BaseType::from(element.attr("base_type").unwrap_or_default()),
            properties,
            choices,
        })
    }

    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }

    /// 합계 집계 대상 (`does_total == "1"`)
    pub fn does_total(&self) -> bool {
        self.property("does_total") == Some("1")
    }

    /// 평균 집계 대상 (`does_average == "1"`)
    pub fn does_average(&self) -> bool {
        self.property("does_average") == Some("1")
    }

    pub fn is_built_in(&self) -> bool {
        is_built_in_field(self.id)
    }

    /// 필드 속성에서 값 포맷 옵션을 만듭니다.
    pub fn format_options(&self) -> FormatOptions {
        FormatOptions {
            currency_symbol: self
                .property("currency_symbol")
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            currency_placement: CurrencyPlacement::from_property(
                self.property("currency_format").unwrap_or_default(),
            ),
            ..FormatOptions::default()
        }
    }
}

/// 서버에 저장된 리포트(쿼리) 정의
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub id: String,
    pub name: String,
    pub report_type: String,
    pub criteria: Option<String>,
    pub clist: Option<String>,
    pub slist: Option<String>,
    pub options: Option<String>,
}

impl Report {
    fn from_element(element: &Element) -> Self {
        let text = |name: &str| element.child_text(name).map(str::to_string);
        Self {
            id: element.attr("id").unwrap_or_default().to_string(),
            name: text("qyname").unwrap_or_default(),
            report_type: text("qytype").unwrap_or_default(),
            criteria: text("qycrit"),
            clist: text("qyclst"),
            slist: text("qyslst"),
            options: text("qyopts"),
        }
    }
}

/// 자식 테이블 링크 (`chdbid`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildTable {
    /// 정규화된 이름 (`_dbid_customers` 형태)
    pub name: String,
    pub table_id: String,
}

/// 자식 테이블 이름을 `chdbid`의 `name` 형태로 정규화합니다.
///
/// `_dbid_` 접두사 + 소문자 + 영숫자/`_` 이외 문자는 `_`로 치환합니다.
pub fn child_table_key(name: &str) -> String {
    let normalized: String = name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if normalized.starts_with("_dbid_") {
        normalized
    } else {
        format!("_dbid_{normalized}")
    }
}

/// 단일 테이블 스키마
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Schema {
    pub table_id: String,
    pub name: String,
    pub description: String,
    pub key_fid: Option<u32>,
    pub next_record_id: Option<u64>,
    pub fields: Vec<FieldDef>,
    pub reports: Vec<Report>,
    pub child_tables: Vec<ChildTable>,
    pub variables: Vec<(String, String)>,
}

impl Schema {
    /// 응답 루트(`qdbapi`)에서 스키마를 추출합니다.
    ///
    /// # 에러
    ///
    /// - [`QdbError::MalformedResponse`]: `table` 엘리먼트가 없음
    pub fn from_root(table_id: &str, root: &Element) -> Result<Self> {
        let table = root
            .child("table")
            .ok_or_else(|| QdbError::MalformedResponse("table".to_string()))?;
        let text = |path: &str| table.select_first(path).map(|e| e.text_or_empty().trim().to_string());

        let fields = table
            .select("fields/field")
            .into_iter()
            .filter_map(FieldDef::from_element)
            .collect();
        let reports = table
            .select("queries/query")
            .into_iter()
            .map(Report::from_element)
            .collect();
        let child_tables = table
            .select("chdbids/chdbid")
            .into_iter()
            .filter_map(|e| {
                Some(ChildTable {
                    name: e.attr("name")?.to_string(),
                    table_id: e.text()?.trim().to_string(),
                })
            })
            .collect();
        let variables = table
            .select("variables/var")
            .into_iter()
            .filter_map(|e| Some((e.attr("name")?.to_string(), e.text_or_empty().to_string())))
            .collect();

        Ok(Self {
            table_id: table_id.to_string(),
            name: text("name").unwrap_or_default(),
            description: text("desc").unwrap_or_default(),
            key_fid: text("original/key_fid").and_then(|s| s.parse().ok()),
            next_record_id: text("original/next_record_id").and_then(|s| s.parse().ok()),
            fields,
            reports,
            child_tables,
            variables,
        })
    }

    /// 라벨로 필드를 찾습니다 (대소문자 무시, 첫 일치).
    pub fn field_by_label(&self, label: &str) -> Option<&FieldDef> {
        let wanted = label.to_lowercase();
        self.fields.iter().find(|f| f.label.to_lowercase() == wanted)
    }

    pub fn field_by_id(&self, fid: u32) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.id == fid)
    }

    pub fn field_id(&self, label: &str) -> Option<u32> {
        self.field_by_label(label).map(|f| f.id)
    }

    pub fn field_label(&self, fid: u32) -> Option<&str> {
        self.field_by_id(fid).map(|f| f.label.as_str())
    }

    /// 라벨로 먼저 찾고, 없으면 숫자 문자열을 field id로 해석합니다.
    pub fn resolve_field_id(&self, name: &str) -> Option<u32> {
        self.field_id(name).or_else(|| {
            let trimmed = name.trim();
            if !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit()) {
                trimmed.parse().ok()
            } else {
                None
            }
        })
    }

    /// [`resolve_field_id`](Self::resolve_field_id)로 찾은 필드 정의
    pub fn field_by_name(&self, name: &str) -> Option<&FieldDef> {
        self.field_by_id(self.resolve_field_id(name)?)
    }

    pub fn fields_of_type(&self, field_type: &FieldType) -> Vec<&FieldDef> {
        self.fields
            .iter()
            .filter(|f| &f.field_type == field_type)
            .collect()
    }

    /// 레코드 ID 필드 (`field_type == "recordid"`)
    pub fn record_id_field(&self) -> Option<&FieldDef> {
        self.fields
            .iter()
            .find(|f| f.field_type == FieldType::RecordId)
    }

    /// field id 목록 (문서 순서)
    pub fn field_ids(&self, exclude_built_in: bool) -> Vec<u32> {
        self.fields
            .iter()
            .filter(|f| !(exclude_built_in && f.is_built_in()))
            .map(|f| f.id)
            .collect()
    }

    /// 필드 라벨 목록 (문서 순서)
    pub fn field_names(&self, exclude_built_in: bool, case: NameCase) -> Vec<String> {
        self.fields
            .iter()
            .filter(|f| !(exclude_built_in && f.is_built_in()))
            .map(|f| match case {
                NameCase::AsIs => f.label.clone(),
                NameCase::Lower => f.label.to_lowercase(),
                NameCase::Upper => f.label.to_uppercase(),
            })
            .collect()
    }

    pub fn field_type(&self, name: &str) -> Option<&FieldType> {
        self.field_by_label(name).map(|f| &f.field_type)
    }

    pub fn base_type(&self, name: &str) -> Option<BaseType> {
        self.field_by_label(name).map(|f| f.base_type)
    }

    pub fn property(&self, name: &str, property: &str) -> Option<&str> {
        self.field_by_label(name)?.property(property)
    }

    pub fn is_total_field(&self, name: &str) -> bool {
        self.field_by_label(name).is_some_and(FieldDef::does_total)
    }

    pub fn is_average_field(&self, name: &str) -> bool {
        self.field_by_label(name).is_some_and(FieldDef::does_average)
    }

    pub fn is_recordid_field(&self, name: &str) -> bool {
        self.field_type(name) == Some(&FieldType::RecordId)
    }

    /// 선택형 필드의 선택지. 필드가 없으면 `None`.
    pub fn choices(&self, name: &str) -> Option<&[String]> {
        self.field_by_label(name).map(|f| f.choices.as_slice())
    }

    pub fn report_by_id(&self, id: &str) -> Option<&Report> {
        self.reports.iter().find(|r| r.id == id)
    }

    /// 리포트 이름으로 찾습니다 (대소문자 무시).
    pub fn report_by_name(&self, name: &str) -> Option<&Report> {
        let wanted = name.to_lowercase();
        self.reports.iter().find(|r| r.name.to_lowercase() == wanted)
    }

    /// 리포트 ID 또는 이름으로 찾습니다.
    pub fn report(&self, id_or_name: &str) -> Option<&Report> {
        self.report_by_id(id_or_name)
            .or_else(|| self.report_by_name(id_or_name))
    }

    pub fn report_names(&self) -> Vec<&str> {
        self.reports.iter().map(|r| r.name.as_str()).collect()
    }

    /// 자식 테이블 이름으로 테이블 ID를 찾습니다.
    ///
    /// # 예시
    ///
    /// ```
    /// use qdbapi::schema::{ChildTable, Schema};
    ///
    /// let schema = Schema {
    ///     child_tables: vec![ChildTable {
    ///         name: "_dbid_order_items".to_string(),
    ///         table_id: "bdcagynhs".to_string(),
    ///     }],
    ///     ..Schema::default()
    /// };
    /// assert_eq!(schema.child_table_id("Order Items"), Some("bdcagynhs"));
    /// ```
    pub fn child_table_id(&self, name: &str) -> Option<&str> {
        let key = child_table_key(name);
        self.child_tables
            .iter()
            .find(|c| c.name == key)
            .map(|c| c.table_id.as_str())
    }

    pub fn variable(&self, name: &str) -> Option<&str> {
        self.variables
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

/// 테이블 ID별 스키마 스냅샷 캐시 (만료 없음)
///
/// 꺼낼 때마다 복제본을 돌려주므로 활성 스키마를 변경해도 캐시 항목은 영향받지 않습니다.
#[derive(Debug, Clone, Default)]
pub struct SchemaCache {
    entries: HashMap<String, Schema>,
}

impl SchemaCache {
    pub fn get(&self, table_id: &str) -> Option<Schema> {
        self.entries.get(table_id).cloned()
    }

    /// 이미 있는 항목은 덮어쓰지 않습니다.
    pub fn insert(&mut self, schema: &Schema) {
        self.entries
            .entry(schema.table_id.clone())
            .or_insert_with(|| schema.clone());
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
