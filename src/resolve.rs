//! 식별자 문자열 분류와 명시적 조회 접근자
//!
//! `dbid_…`, `rid_…`, `qid_…`, `fid_…` 접두어 또는 접두어 없는 base32 테이블 ID를
//! 정규식 표로 분류하고, 종류별 접근자([`Client::get_table_by_id`] 등)로 보냅니다.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::client::Client;
use crate::error::{QdbError, Result};
use crate::query::QueryResult;
use crate::schema::{FieldDef, NameCase, Schema};
use crate::transport::Transport;
use crate::types::{Record, Selector};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IdKind {
    Table,
    Record,
    Report,
    Field,
}

const ID_RULES: [(IdKind, &str); 5] = [
    (IdKind::Table, r"^dbid_([a-km-np-z2-9]+)$"),
    (IdKind::Record, r"^rid_(\d+)$"),
    (IdKind::Report, r"^qid_(\d+)$"),
    (IdKind::Field, r"^fid_(\d+)$"),
    (IdKind::Table, r"^([a-km-np-z2-9]+)$"),
];

/// 분류 규칙 (순서대로 시도, 첫 일치)
static ID_PATTERNS: LazyLock<Vec<(IdKind, Regex)>> = LazyLock::new(|| {
    ID_RULES
        .into_iter()
        .filter_map(|(kind, pattern)| Regex::new(pattern).ok().map(|regex| (kind, regex)))
        .collect()
});

/// 분류된 식별자
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identifier {
    Table(String),
    Record(u64),
    Report(String),
    Field(u32),
}

/// 식별자 문자열을 분류합니다. 어떤 규칙에도 맞지 않으면 `None`입니다.
///
/// # 예시
///
/// ```
/// use qdbapi::resolve::{classify, Identifier};
///
/// assert_eq!(classify("dbid_bdb5rjd6h"), Some(Identifier::Table("bdb5rjd6h".to_string())));
/// assert_eq!(classify("rid_42"), Some(Identifier::Record(42)));
/// assert_eq!(classify("fid_7"), Some(Identifier::Field(7)));
/// assert_eq!(classify("Customers"), None);
/// ```
pub fn classify(input: &str) -> Option<Identifier> {
    let input = input.trim();
    ID_PATTERNS.iter().find_map(|(kind, regex)| {
        let captured = regex.captures(input)?.get(1)?.as_str();
        match kind {
            IdKind::Table => Some(Identifier::Table(captured.to_string())),
            IdKind::Record => captured.parse().ok().map(Identifier::Record),
            IdKind::Report => Some(Identifier::Report(captured.to_string())),
            IdKind::Field => captured.parse().ok().map(Identifier::Field),
        }
    })
}

/// [`Client::resolve`] 결과
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    Table(Schema),
    Record(Option<Record>),
    Report(QueryResult),
    Field(Option<FieldDef>),
}

impl<T: Transport> Client<T> {
    /// 테이블 스키마를 가져오고 활성 테이블로 만듭니다.
    pub async fn get_table_by_id(&mut self, table_id: &str) -> Result<Schema> {
        self.get_schema(table_id).await
    }

    /// 활성 테이블에서 레코드 하나를 모든 필드와 함께 가져옵니다.
    ///
    /// # 에러
    ///
    /// - [`QdbError::NoActiveTable`]: 활성 테이블 없음
    pub async fn get_record_by_id(&mut self, rid: u64) -> Result<Option<Record>> {
        let table_id = self.require_active_table("getRecordById")?;
        let schema = self.get_schema(&table_id).await?;
        let names = schema.field_names(false, NameCase::AsIs);
        self.get_record_with_schema(&schema, &table_id, rid, &names)
            .await
    }

    /// 활성 테이블의 리포트를 실행합니다.
    pub async fn get_report_by_id(&mut self, qid: &str) -> Result<QueryResult> {
        let table_id = self.require_active_table("getReportById")?;
        self.run_query(&table_id, &Selector::ReportId(qid.to_string()))
            .await
    }

    /// 활성 테이블의 필드 정의. 찾으면 활성 필드가 됩니다.
    pub async fn get_field_by_id(&mut self, fid: u32) -> Result<Option<FieldDef>> {
        let table_id = self.require_active_table("getFieldById")?;
        let schema = self.get_schema(&table_id).await?;
        let field = schema.field_by_id(fid).cloned();
        if field.is_some() {
            self.set_active_field(Some(fid));
        }
        Ok(field)
    }

    /// 식별자 문자열을 분류해 해당 접근자를 호출합니다.
    ///
    /// # 에러
    ///
    /// - [`QdbError::InvalidArgument`]: 식별자 형식이 아님
    pub async fn resolve(&mut self, input: &str) -> Result<Resolved> {
        let identifier = classify(input)
            .ok_or_else(|| QdbError::InvalidArgument(format!("not an identifier: {input}")))?;
        debug!(?identifier, "resolving identifier");
        match identifier {
            Identifier::Table(id) => self.get_table_by_id(&id).await.map(Resolved::Table),
            Identifier::Record(rid) => self.get_record_by_id(rid).await.map(Resolved::Record),
            Identifier::Report(qid) => self.get_report_by_id(&qid).await.map(Resolved::Report),
            Identifier::Field(fid) => self.get_field_by_id(fid).await.map(Resolved::Field),
        }
    }

    fn require_active_table(&self, operation: &str) -> Result<String> {
        self.active_table()
            .map(str::to_string)
            .ok_or_else(|| QdbError::NoActiveTable {
                operation: operation.to_string(),
            })
    }
}
