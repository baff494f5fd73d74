//! 쿼리/레코드 엔진
//!
//! `doQuery` 한 번의 결과를 필드 이름 기준의 열([`FieldValues`]) 또는 레코드([`Record`])로
//! 재구성하고, 그 위에 순회, 필터, 조인, 유니온, 그룹 집계를 구현합니다.
//!
//! 상위 헬퍼는 테이블마다 `getSchema` 한 번과 `doQuery` 한 번을 보냅니다.
//! 스키마는 캐시를 켠 경우에만 재사용합니다.

use std::collections::HashSet;

use tracing::debug;

use crate::api::{FieldValuePairs, WriteOptions};
use crate::client::Client;
use crate::codec::Request;
use crate::constants::{RECORD_ID_FID, STRUCTURED_FMT};
use crate::error::{QdbError, Result};
use crate::format::format_field_value;
use crate::schema::{NameCase, Schema};
use crate::transport::Transport;
use crate::types::{BaseType, FieldFilter, FieldValue, FieldValues, Record, Selector};
use crate::xml::Element;

/// `doQuery` 추가 파라미터
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOptions {
    /// 가져올 field id 목록 (`6.7.8`)
    pub clist: Option<String>,
    /// 정렬 field id 목록
    pub slist: Option<String>,
    /// `num-10.skp-20.sortorder-D` 형식의 옵션
    pub options: Option<String>,
}

/// 구조화된 쿼리 응답의 레코드 하나
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRecord {
    pub rid: Option<u64>,
    pub update_id: Option<String>,
    /// (field id, 값) 목록 (응답 순서)
    pub values: Vec<(u32, String)>,
}

impl RawRecord {
    fn from_element(element: &Element) -> Self {
        let values = element
            .children_named("f")
            .filter_map(|f| {
                let fid = f.attr("id")?.parse().ok()?;
                Some((fid, f.text_or_empty().to_string()))
            })
            .collect();
        Self {
            rid: element.attr("rid").and_then(|r| r.parse().ok()),
            update_id: element.attr("update_id").map(str::to_string),
            values,
        }
    }

    pub fn value(&self, fid: u32) -> Option<&str> {
        self.values
            .iter()
            .find(|(id, _)| *id == fid)
            .map(|(_, v)| v.as_str())
    }
}

/// `doQuery` 결과
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryResult {
    pub table_id: String,
    pub records: Vec<RawRecord>,
}

impl QueryResult {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// 조인에 참여하는 테이블 하나
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinSpec {
    pub table_id: String,
    pub selector: Selector,
    /// 테이블 사이에서 값이 같아야 하는 필드
    pub join_field: String,
    /// 결과에 넣을 필드 (조인 필드는 자동 포함)
    pub fields: Vec<String>,
}

/// 유니온에 참여하는 테이블 하나
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnionSpec {
    pub table_id: String,
    pub selector: Selector,
}

#[derive(Debug, Clone, Copy)]
enum Sum {
    Int(i64),
    Float(f64),
}

impl Sum {
    /// 정수 합이 넘치면 실수 합으로 바뀝니다.
    fn add(&mut self, value: &FieldValue) {
        match (*self, value) {
            (Sum::Int(total), FieldValue::Int(v)) => {
                *self = match total.checked_add(*v) {
                    Some(sum) => Sum::Int(sum),
                    None => Sum::Float(total as f64 + *v as f64),
                }
            }
            (Sum::Float(total), v) => *self = Sum::Float(total + v.as_f64().unwrap_or(0.0)),
            (Sum::Int(_), _) => {}
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Sum::Int(i) => i as f64,
            Sum::Float(f) => f,
        }
    }

    fn to_value(self) -> FieldValue {
        match self {
            Sum::Int(i) => FieldValue::Int(i),
            Sum::Float(f) => FieldValue::Float(f),
        }
    }
}

/// 그룹 집계 대상 필드
struct Aggregate {
    name: String,
    base_type: BaseType,
    total: bool,
    average: bool,
}

/// 레코드 ID 목록을 `{'3'.EX.'rid'}OR...` criteria로 만듭니다.
pub(crate) fn record_id_criteria(rids: &[u64]) -> String {
    rids.iter()
        .map(|rid| format!("{{'{RECORD_ID_FID}'.EX.'{rid}'}}"))
        .collect::<Vec<_>>()
        .join("OR")
}

impl<T: Transport> Client<T> {
    /// 선택자에 일치하는 레코드를 가져옵니다.
    pub async fn run_query(&mut self, table_id: &str, selector: &Selector) -> Result<QueryResult> {
        self.run_query_with(table_id, selector, &QueryOptions::default())
            .await
    }

    /// [`run_query`](Self::run_query)에 clist/slist/options를 더합니다.
    ///
    /// 리포트 선택자이고 clist/slist가 없으면, 활성 스키마의 리포트 정의에 있는 목록을 씁니다.
    pub async fn run_query_with(
        &mut self,
        table_id: &str,
        selector: &Selector,
        options: &QueryOptions,
    ) -> Result<QueryResult> {
        let mut options = options.clone();
        let report_key = match selector {
            Selector::ReportId(id) => Some(id.as_str()),
            Selector::ReportName(name) => Some(name.as_str()),
            _ => None,
        };
        if let (Some(key), Some(schema)) = (report_key, self.schema()) {
            if schema.table_id == table_id {
                if let Some(report) = schema.report(key) {
                    options.clist = options.clist.or_else(|| report.clist.clone());
                    options.slist = options.slist.or_else(|| report.slist.clone());
                }
            }
        }

        let (tag, value) = selector.request_field();
        let request = Request::for_table("doQuery", table_id)
            .field(tag, value)
            .field_opt("clist", options.clist.as_deref())
            .field_opt("slist", options.slist.as_deref())
            .field_opt("options", options.options.as_deref())
            .field("fmt", STRUCTURED_FMT)
            .flag("includeRids", true);
        let resp = self.send_request(request).await?;

        let records: Vec<RawRecord> = resp
            .elements("table/records/record")
            .into_iter()
            .map(RawRecord::from_element)
            .collect();
        debug!(table_id, count = records.len(), "query returned records");
        Ok(QueryResult {
            table_id: table_id.to_string(),
            records,
        })
    }

    /// 필드 이름(또는 숫자 field id) 목록의 값을 열 단위로 가져옵니다.
    ///
    /// 모든 열의 길이는 일치한 레코드 수와 같습니다. 스키마에서 찾을 수 없는 이름의 열은 빈 값으로 채워집니다.
    ///
    /// # 예시
    ///
    /// ```no_run
    /// use qdbapi::types::Selector;
    /// # async fn example(client: &mut qdbapi::Client<qdbapi::transport::HttpTransport>) -> qdbapi::Result<()> {
    /// let values = client
    ///     .fetch_field_values("bdb5rjd6h", &["Customer", "Amount"], &Selector::All)
    ///     .await?;
    /// for (customer, amount) in values.column("Customer").unwrap().iter().zip(values.column("Amount").unwrap()) {
    ///     println!("{customer}: {amount}");
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn fetch_field_values<S: AsRef<str>>(
        &mut self,
        table_id: &str,
        names: &[S],
        selector: &Selector,
    ) -> Result<FieldValues> {
        self.fetch_field_values_with(table_id, names, selector, &QueryOptions::default())
            .await
    }

    /// [`fetch_field_values`](Self::fetch_field_values)에 slist/options를 더합니다. clist는 항상 새로 만듭니다.
    ///
    /// 이름 목록이 비어 있으면 스키마의 모든 필드를 가져옵니다.
    pub async fn fetch_field_values_with<S: AsRef<str>>(
        &mut self,
        table_id: &str,
        names: &[S],
        selector: &Selector,
        options: &QueryOptions,
    ) -> Result<FieldValues> {
        let schema = self.get_schema(table_id).await?;
        self.fetch_with_schema(&schema, table_id, names, selector, options)
            .await
    }

    /// 이미 가져온 스키마로 이름을 해석해 `doQuery` 한 번을 보냅니다.
    pub(crate) async fn fetch_with_schema<S: AsRef<str>>(
        &mut self,
        schema: &Schema,
        table_id: &str,
        names: &[S],
        selector: &Selector,
        options: &QueryOptions,
    ) -> Result<FieldValues> {
        let names: Vec<String> = if names.is_empty() {
            schema.field_names(false, NameCase::AsIs)
        } else {
            names.iter().map(|n| n.as_ref().to_string()).collect()
        };
        let resolved: Vec<(&str, Option<u32>)> = names
            .iter()
            .map(|n| (n.as_str(), schema.resolve_field_id(n)))
            .collect();

        let mut clist: Vec<String> = Vec::new();
        for fid in resolved.iter().filter_map(|(_, fid)| *fid) {
            let fid = fid.to_string();
            if !clist.contains(&fid) {
                clist.push(fid);
            }
        }
        // NOTE: an empty clist would return the default report columns, so ask for the record id
        if clist.is_empty() {
            clist.push(RECORD_ID_FID.to_string());
        }

        let options = QueryOptions {
            clist: Some(clist.join(".")),
            ..options.clone()
        };
        let result = self.run_query_with(table_id, selector, &options).await?;

        let mut values = FieldValues::with_names(&names);
        for record in &result.records {
            values.push_empty_row();
            for (name, fid) in &resolved {
                if let Some(value) = fid.and_then(|f| record.value(f)) {
                    values.set_last(name, value);
                }
            }
        }
        Ok(values)
    }

    /// 일치하는 레코드마다 `f`를 호출하고 레코드 수를 돌려줍니다. 요청은 한 번입니다.
    pub async fn for_each_record<S, F>(
        &mut self,
        table_id: &str,
        names: &[S],
        selector: &Selector,
        mut f: F,
    ) -> Result<usize>
    where
        S: AsRef<str>,
        F: FnMut(&Record),
    {
        let values = self.fetch_field_values(table_id, names, selector).await?;
        let mut count = 0;
        for record in values.rows() {
            f(&record);
            count += 1;
        }
        Ok(count)
    }

    pub async fn records<S: AsRef<str>>(
        &mut self,
        table_id: &str,
        names: &[S],
        selector: &Selector,
    ) -> Result<Vec<Record>> {
        let values = self.fetch_field_values(table_id, names, selector).await?;
        Ok(values.rows().collect())
    }

    /// 정규식 조건이 있는 모든 필드가 일치하는 레코드만 `f`에 넘깁니다.
    pub async fn for_each_filtered_record<F>(
        &mut self,
        table_id: &str,
        filters: &[FieldFilter],
        selector: &Selector,
        mut f: F,
    ) -> Result<usize>
    where
        F: FnMut(&Record),
    {
        let records = self.filtered_records(table_id, filters, selector).await?;
        for record in &records {
            f(record);
        }
        Ok(records.len())
    }

    pub async fn filtered_records(
        &mut self,
        table_id: &str,
        filters: &[FieldFilter],
        selector: &Selector,
    ) -> Result<Vec<Record>> {
        let names: Vec<&str> = filters.iter().map(|f| f.name.as_str()).collect();
        let values = self.fetch_field_values(table_id, &names, selector).await?;
        Ok(values
            .rows()
            .filter(|record| {
                filters
                    .iter()
                    .all(|filter| filter.accepts(record.get(&filter.name).unwrap_or_default()))
            })
            .collect())
    }

    /// 여러 테이블을 조인 필드 값으로 내부 조인합니다.
    ///
    /// 첫 테이블의 각 레코드에 대해, 나머지 테이블의 일치 레코드 조합(데카르트 곱)을 만들고
    /// 뒤 테이블의 값이 같은 이름의 앞 테이블 값을 덮어씁니다. 어느 한 테이블이라도
    /// 일치 레코드가 없으면 그 레코드는 결과에서 빠집니다.
    ///
    /// # 에러
    ///
    /// - [`QdbError::InvalidArgument`]: 테이블이 두 개 미만
    pub async fn join(&mut self, specs: &[JoinSpec]) -> Result<Vec<Record>> {
        if specs.len() < 2 {
            return Err(QdbError::InvalidArgument(
                "join needs at least two tables".to_string(),
            ));
        }

        let mut tables: Vec<Vec<Record>> = Vec::with_capacity(specs.len());
        for spec in specs {
            let mut names = spec.fields.clone();
            if !names.contains(&spec.join_field) {
                names.push(spec.join_field.clone());
            }
            tables.push(self.records(&spec.table_id, &names, &spec.selector).await?);
        }

        let mut joined = Vec::new();
        for primary in &tables[0] {
            let key = primary.get(&specs[0].join_field).unwrap_or_default();
            let mut combos = vec![primary.clone()];
            for (spec, rows) in specs.iter().zip(&tables).skip(1) {
                let matches: Vec<&Record> = rows
                    .iter()
                    .filter(|r| r.get(&spec.join_field).unwrap_or_default() == key)
                    .collect();
                combos = combos
                    .iter()
                    .flat_map(|combo| {
                        matches.iter().map(move |m| {
                            let mut merged = combo.clone();
                            merged.merge(m);
                            merged
                        })
                    })
                    .collect();
                if combos.is_empty() {
                    break;
                }
            }
            joined.extend(combos);
        }
        Ok(joined)
    }

    /// 같은 필드 이름 집합으로 여러 테이블을 이어 붙이고 값 전체가 같은 행을 제거합니다.
    ///
    /// 처음 나온 행의 순서를 유지합니다.
    pub async fn union<S: AsRef<str>>(
        &mut self,
        specs: &[UnionSpec],
        names: &[S],
    ) -> Result<FieldValues> {
        if specs.len() < 2 {
            return Err(QdbError::InvalidArgument(
                "union needs at least two tables".to_string(),
            ));
        }

        let mut combined = FieldValues::with_names(names);
        let mut seen: HashSet<Vec<String>> = HashSet::new();
        for spec in specs {
            let values = self
                .fetch_field_values(&spec.table_id, names, &spec.selector)
                .await?;
            for record in values.rows() {
                let key: Vec<String> = record.iter().map(|(_, v)| v.to_string()).collect();
                if seen.insert(key) {
                    combined.push_record(&record);
                }
            }
        }
        Ok(combined)
    }

    /// 그룹별 개수/합계/평균
    ///
    /// 합계(`does_total`) 또는 평균(`does_average`) 속성이 있는 필드는 집계 필드, 나머지는 그룹 필드입니다.
    /// 결과 레코드는 그룹 필드 값, `{필드}:Total`, `{필드}:Average`, `Count` 순서입니다.
    /// 빈 값은 0으로 집계합니다.
    pub async fn summary<S: AsRef<str>>(
        &mut self,
        table_id: &str,
        names: &[S],
        selector: &Selector,
    ) -> Result<Vec<Record>> {
        let schema = self.get_schema(table_id).await?;
        let mut group_fields: Vec<String> = Vec::new();
        let mut aggregates: Vec<Aggregate> = Vec::new();
        for name in names {
            let name = name.as_ref();
            match schema.field_by_name(name) {
                Some(field) if field.does_total() || field.does_average() => {
                    aggregates.push(Aggregate {
                        name: name.to_string(),
                        base_type: field.base_type,
                        total: field.does_total(),
                        average: field.does_average(),
                    })
                }
                _ => group_fields.push(name.to_string()),
            }
        }

        let slist: Vec<String> = group_fields
            .iter()
            .filter_map(|n| schema.resolve_field_id(n))
            .map(|fid| fid.to_string())
            .collect();
        let options = QueryOptions {
            slist: (!slist.is_empty()).then(|| slist.join(".")),
            ..QueryOptions::default()
        };
        let values = self
            .fetch_with_schema(&schema, table_id, names, selector, &options)
            .await?;

        let mut rows: Vec<Record> = values.rows().collect();
        let group_key = |record: &Record| -> Vec<String> {
            group_fields
                .iter()
                .map(|n| record.get(n).unwrap_or_default().to_string())
                .collect()
        };
        rows.sort_by_key(|r| group_key(r));

        let new_sums = || -> Vec<Sum> {
            aggregates
                .iter()
                .map(|a| {
                    if a.base_type.is_integer() { Sum::Int(0) } else { Sum::Float(0.0) }
                })
                .collect()
        };
        let emit = |key: &[String], sums: &[Sum], count: u64| -> Record {
            let mut record = Record::new();
            for (name, value) in group_fields.iter().zip(key) {
                record.insert(name.clone(), value.clone());
            }
            for (aggregate, sum) in aggregates.iter().zip(sums) {
                if aggregate.total {
                    record.insert(format!("{}:Total", aggregate.name), sum.to_value().to_string());
                }
                if aggregate.average {
                    let average = FieldValue::Float(sum.as_f64() / count as f64);
                    record.insert(format!("{}:Average", aggregate.name), average.to_string());
                }
            }
            record.insert("Count", count.to_string());
            record
        };

        let mut summary = Vec::new();
        let mut current: Option<(Vec<String>, Vec<Sum>, u64)> = None;
        for row in &rows {
            let key = group_key(row);
            if current.as_ref().is_some_and(|(k, _, _)| *k != key) {
                if let Some((k, sums, count)) = current.take() {
                    summary.push(emit(&k, &sums, count));
                }
            }
            let (_, sums, count) = current.get_or_insert_with(|| (key, new_sums(), 0));
            *count += 1;
            for (aggregate, sum) in aggregates.iter().zip(sums.iter_mut()) {
                let raw = row.get(&aggregate.name).unwrap_or_default();
                let value = match FieldValue::coerce(raw, aggregate.base_type) {
                    FieldValue::Null => FieldValue::Int(0),
                    other => other,
                };
                sum.add(&value);
            }
        }
        if let Some((k, sums, count)) = current {
            summary.push(emit(&k, &sums, count));
        }
        Ok(summary)
    }

    /// 레코드 ID로 레코드 하나를 가져옵니다. 찾으면 활성 레코드가 됩니다.
    pub async fn get_record<S: AsRef<str>>(
        &mut self,
        table_id: &str,
        rid: u64,
        names: &[S],
    ) -> Result<Option<Record>> {
        let schema = self.get_schema(table_id).await?;
        self.get_record_with_schema(&schema, table_id, rid, names)
            .await
    }

    pub(crate) async fn get_record_with_schema<S: AsRef<str>>(
        &mut self,
        schema: &Schema,
        table_id: &str,
        rid: u64,
        names: &[S],
    ) -> Result<Option<Record>> {
        let selector = Selector::criteria(record_id_criteria(&[rid]));
        let values = self
            .fetch_with_schema(schema, table_id, names, &selector, &QueryOptions::default())
            .await?;
        let record = values.row(0);
        if record.is_some() {
            self.set_active_record(Some(rid));
        }
        Ok(record)
    }

    /// 여러 레코드 ID의 레코드를 한 번의 쿼리로 가져옵니다.
    pub async fn get_records<S: AsRef<str>>(
        &mut self,
        table_id: &str,
        rids: &[u64],
        names: &[S],
    ) -> Result<Vec<Record>> {
        if rids.is_empty() {
            return Ok(Vec::new());
        }
        let selector = Selector::criteria(record_id_criteria(rids));
        self.records(table_id, names, &selector).await
    }

    /// 일치하는 모든 레코드를 같은 값으로 수정하고 성공 수를 돌려줍니다.
    ///
    /// 개별 수정 실패는 나머지 수정을 멈추지 않습니다.
    pub async fn edit_records(
        &mut self,
        table_id: &str,
        values: &FieldValuePairs,
        selector: &Selector,
    ) -> Result<usize> {
        let ids = self
            .fetch_field_values(table_id, &[RECORD_ID_FID], selector)
            .await?;
        let rids: Vec<u64> = ids
            .column(RECORD_ID_FID)
            .unwrap_or_default()
            .iter()
            .filter_map(|r| r.parse().ok())
            .collect();

        let mut edited = 0;
        for rid in rids {
            if self
                .edit_record(table_id, rid, values, &WriteOptions::default())
                .await
                .is_ok()
            {
                edited += 1;
            }
        }
        Ok(edited)
    }

    /// 레코드를 JSON 배열로 만듭니다. 값은 필드 타입에 맞게 포맷합니다.
    pub async fn records_as_json<S: AsRef<str>>(
        &mut self,
        table_id: &str,
        names: &[S],
        selector: &Selector,
    ) -> Result<String> {
        let schema = self.get_schema(table_id).await?;
        let records: Vec<Record> = self
            .fetch_with_schema(&schema, table_id, names, selector, &QueryOptions::default())
            .await?
            .rows()
            .map(|record| {
                record
                    .iter()
                    .map(|(name, value)| {
                        let formatted = match schema.field_by_name(name) {
                            Some(field) => {
                                format_field_value(value, &field.field_type, &field.format_options())
                            }
                            None => value.to_string(),
                        };
                        (name.to_string(), formatted)
                    })
                    .collect()
            })
            .collect();
        Ok(serde_json::to_string(&records)?)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use regex::Regex;

    use super::*;
    use crate::schema::tests::SCHEMA_XML;
    use crate::transport::mock::MockTransport;
    use crate::transport::HttpResponse;

    /// `<table><records>...</records></table>` 응답 조각
    pub(crate) fn records_xml(rows: &[(u64, &[(u32, &str)])]) -> String {
        let mut xml = String::from("<table><records>");
        for (rid, fields) in rows {
            xml.push_str(&format!("<record rid=\"{rid}\" update_id=\"u{rid}\">"));
            for (fid, value) in *fields {
                xml.push_str(&format!("<f id=\"{fid}\">{value}</f>"));
            }
            xml.push_str("</record>");
        }
        xml.push_str("</records></table>");
        xml
    }

    pub(crate) fn client_with_schema() -> Client<MockTransport> {
        let mut client = Client::new(MockTransport::default());
        client.set_ticket(Some("T1"));
        client.transport().push(Ok(HttpResponse::ok(SCHEMA_XML)));
        client
    }

    #[test]
    fn test_record_id_criteria() {
        assert_eq!(record_id_criteria(&[4]), "{'3'.EX.'4'}");
        assert_eq!(record_id_criteria(&[4, 9]), "{'3'.EX.'4'}OR{'3'.EX.'9'}");
    }

    #[test]
    fn test_raw_record_from_element() {
        let xml = records_xml(&[(7, &[(6, "Kim"), (7, "10")])]);
        let root = crate::xml::parse(&xml, &crate::xml::ParseOptions::default()).unwrap();
        let record = RawRecord::from_element(root.select_first("records/record").unwrap());
        assert_eq!(record.rid, Some(7));
        assert_eq!(record.update_id.as_deref(), Some("u7"));
        assert_eq!(record.value(6), Some("Kim"));
        assert_eq!(record.value(8), None);
    }

    #[tokio::test]
    async fn test_run_query_payload() {
        let mut client = Client::new(MockTransport::default());
        client.set_ticket(Some("T1"));
        client.transport().push_ok(&records_xml(&[(1, &[(6, "Kim")])]));
        let options = QueryOptions {
            options: Some("num-10".to_string()),
            ..QueryOptions::default()
        };
        let result = client
            .run_query_with("bdb5rjd6h", &Selector::criteria("{'6'.EX.'Kim'}"), &options)
            .await
            .unwrap();
        assert_eq!(result.len(), 1);
        assert!(client.transport().last_body().ends_with(
            "<query>{&apos;6&apos;.EX.&apos;Kim&apos;}</query><options>num-10</options>\
             <fmt>structured</fmt><includeRids>1</includeRids></qdbapi>"
        ));
    }

    #[tokio::test]
    async fn test_report_selector_uses_report_lists() {
        let mut client = client_with_schema();
        client.get_schema("bdb5rjd6h").await.unwrap();
        client.transport().push_ok(&records_xml(&[]));
        client
            .run_query("bdb5rjd6h", &Selector::ReportName("Big Orders".to_string()))
            .await
            .unwrap();
        let body = client.transport().last_body();
        assert!(body.contains("<qname>Big Orders</qname><clist>6.7</clist><slist>7</slist>"));
    }

    #[tokio::test]
    async fn test_fetch_field_values_equal_length_columns() {
        let mut client = client_with_schema();
        client.transport().push_ok(&records_xml(&[
            (1, &[(6, "Kim"), (7, "10")]),
            (2, &[(6, "Lee")]),
            (3, &[(7, "5"), (6, "Park")]),
        ]));
        let values = client
            .fetch_field_values("bdb5rjd6h", &["Customer", "Amount", "customer", "Ghost"], &Selector::All)
            .await
            .unwrap();
        for name in ["Customer", "Amount", "customer", "Ghost"] {
            assert_eq!(values.column(name).unwrap().len(), 3, "{name}");
        }
        assert_eq!(values.column("Amount").unwrap(), ["10", "", "5"]);
        assert_eq!(values.column("customer").unwrap(), ["Kim", "Lee", "Park"]);
        assert_eq!(values.column("Ghost").unwrap(), ["", "", ""]);
        assert!(client.transport().last_body().contains("<clist>6.7</clist>"));
    }

    #[tokio::test]
    async fn test_fetch_numeric_names_and_empty_clist() {
        let mut client = client_with_schema();
        client.transport().push_ok(&records_xml(&[(4, &[(3, "4")])]));
        let values = client
            .fetch_field_values("bdb5rjd6h", &["Ghost"], &Selector::All)
            .await
            .unwrap();
        assert_eq!(values.len(), 1);
        assert!(client.transport().last_body().contains("<clist>3</clist>"));

        client
            .transport()
            .push_schema()
            .push_ok(&records_xml(&[(4, &[(3, "4")])]));
        let values = client
            .fetch_field_values("bdb5rjd6h", &["3"], &Selector::All)
            .await
            .unwrap();
        assert_eq!(values.column("3").unwrap(), ["4"]);
        assert_eq!(client.transport().request_count(), 4);
    }

    #[tokio::test]
    async fn test_fetch_without_names_uses_all_fields() {
        let mut client = client_with_schema();
        client
            .transport()
            .push_ok(&records_xml(&[(4, &[(3, "4"), (6, "Kim")]), (5, &[(3, "5")])]));
        let names: [&str; 0] = [];
        let values = client
            .fetch_field_values("bdb5rjd6h", &names, &Selector::All)
            .await
            .unwrap();
        assert_eq!(values.len(), 2);
        assert_eq!(values.column("Customer").unwrap(), ["Kim", ""]);
        assert!(client.transport().last_body().contains("<clist>1.3.6.7.8.9"));
    }

    #[tokio::test]
    async fn test_new_field_resolves_on_next_fetch() {
        let mut client = client_with_schema();
        client.get_schema("bdb5rjd6h").await.unwrap();
        let with_notes = SCHEMA_XML.replace(
            "</fields>",
            "<field id=\"11\" field_type=\"text\" base_type=\"text\"><label>Notes</label></field></fields>",
        );
        client
            .transport()
            .push_ok("<fid>11</fid><label>Notes</label>")
            .push(Ok(HttpResponse::ok(with_notes)))
            .push_ok(&records_xml(&[(1, &[(11, "call back")])]));

        client.add_field("bdb5rjd6h", "Notes", "text", None).await.unwrap();
        let values = client
            .fetch_field_values("bdb5rjd6h", &["Notes"], &Selector::All)
            .await
            .unwrap();
        assert_eq!(values.column("Notes").unwrap(), ["call back"]);

        let actions: Vec<String> = client
            .transport()
            .requests()
            .iter()
            .filter_map(|r| r.header("QUICKBASE-ACTION").map(str::to_string))
            .collect();
        assert_eq!(
            actions,
            ["API_getSchema", "API_addField", "API_getSchema", "API_doQuery"]
        );
        assert!(client.transport().last_body().contains("<clist>11</clist>"));
    }

    #[tokio::test]
    async fn test_for_each_record_single_round_trip() {
        let mut client = client_with_schema();
        client
            .transport()
            .push_ok(&records_xml(&[(1, &[(6, "Kim")]), (2, &[(6, "Lee")])]));
        let mut seen = Vec::new();
        let count = client
            .for_each_record("bdb5rjd6h", &["Customer"], &Selector::All, |r| {
                seen.push(r.get("Customer").unwrap_or_default().to_string())
            })
            .await
            .unwrap();
        assert_eq!(count, 2);
        assert_eq!(seen, vec!["Kim", "Lee"]);
        assert_eq!(client.transport().request_count(), 2);
    }

    #[tokio::test]
    async fn test_filtered_records() {
        let mut client = client_with_schema();
        client.transport().push_ok(&records_xml(&[
            (1, &[(6, "Kim"), (9, "Open")]),
            (2, &[(6, "Lee"), (9, "Open")]),
            (3, &[(6, "Kang"), (9, "Closed")]),
        ]));
        let filters = [
            FieldFilter::matching("Customer", Regex::new("^K").unwrap()),
            FieldFilter::matching("Status", Regex::new("Open").unwrap()),
        ];
        let records = client
            .filtered_records("bdb5rjd6h", &filters, &Selector::All)
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get("Customer"), Some("Kim"));
    }

    #[tokio::test]
    async fn test_summary_groups_and_totals() {
        let mut client = client_with_schema();
        client.transport().push_ok(&records_xml(&[
            (1, &[(6, "B"), (7, "5"), (8, "4")]),
            (2, &[(6, "A"), (7, "10"), (8, "3")]),
            (3, &[(6, "A"), (7, "20"), (8, "")]),
        ]));
        let summary = client
            .summary("bdb5rjd6h", &["Customer", "Amount", "Rating"], &Selector::All)
            .await
            .unwrap();
        assert_eq!(summary.len(), 2);
        assert_eq!(
            summary[0].iter().collect::<Vec<_>>(),
            vec![
                ("Customer", "A"),
                ("Amount:Total", "30"),
                ("Rating:Average", "1.5"),
                ("Count", "2")
            ]
        );
        assert_eq!(summary[1].get("Amount:Total"), Some("5"));
        assert_eq!(summary[1].get("Count"), Some("1"));
        assert!(client.transport().last_body().contains("<slist>6</slist>"));
    }

    #[tokio::test]
    async fn test_summary_accepts_field_ids_and_wide_totals() {
        let mut client = Client::new(MockTransport::default());
        client.set_ticket(Some("T1"));
        let wide = SCHEMA_XML.replace(
            "<label>Date Created</label>",
            "<label>Date Created</label><does_total>1</does_total>",
        );
        client
            .transport()
            .push(Ok(HttpResponse::ok(wide)))
            .push_ok(&records_xml(&[
                (1, &[(6, "A"), (1, "9223372036854775807"), (7, "2")]),
                (2, &[(6, "A"), (1, "1"), (7, "3")]),
            ]));

        let summary = client
            .summary("bdb5rjd6h", &["Customer", "1", "7"], &Selector::All)
            .await
            .unwrap();
        assert_eq!(summary.len(), 1);
        let total: f64 = summary[0].get("1:Total").unwrap().parse().unwrap();
        assert_eq!(total, i64::MAX as f64 + 1.0);
        assert_eq!(summary[0].get("7:Total"), Some("5"));
        assert_eq!(summary[0].get("Count"), Some("2"));
        assert!(client.transport().last_body().contains("<slist>6</slist>"));
    }

    #[test]
    fn test_integer_sum_widens_on_overflow() {
        let mut sum = Sum::Int(i64::MAX);
        sum.add(&FieldValue::Int(1));
        assert!(matches!(sum, Sum::Float(f) if f == i64::MAX as f64 + 1.0));

        let mut sum = Sum::Int(40);
        sum.add(&FieldValue::Int(2));
        assert!(matches!(sum, Sum::Int(42)));
    }

    #[tokio::test]
    async fn test_summary_empty_input() {
        let mut client = client_with_schema();
        client.transport().push_ok(&records_xml(&[]));
        let summary = client
            .summary("bdb5rjd6h", &["Customer", "Amount"], &Selector::All)
            .await
            .unwrap();
        assert!(summary.is_empty());
    }

    #[tokio::test]
    async fn test_get_record_sets_active_record() {
        let mut client = client_with_schema();
        client.transport().push_ok(&records_xml(&[(4, &[(6, "Kim")])]));
        let record = client
            .get_record("bdb5rjd6h", 4, &["Customer"])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.get("Customer"), Some("Kim"));
        assert_eq!(client.active_record(), Some(4));
        assert!(client
            .transport()
            .last_body()
            .contains("<query>{&apos;3&apos;.EX.&apos;4&apos;}</query>"));
    }

    #[tokio::test]
    async fn test_get_records_empty_ids_no_request() {
        let mut client = Client::new(MockTransport::default());
        client.set_ticket(Some("T1"));
        let records = client.get_records("bdb5rjd6h", &[], &["Customer"]).await.unwrap();
        assert!(records.is_empty());
        assert_eq!(client.transport().request_count(), 0);
    }

    #[tokio::test]
    async fn test_edit_records_counts_successes() {
        let mut client = client_with_schema();
        client
            .transport()
            .push_ok(&records_xml(&[(1, &[(3, "1")]), (2, &[(3, "2")]), (3, &[(3, "3")])]))
            .push_ok("<rid>1</rid><update_id>2</update_id>")
            .push_error("30", "No such record")
            .push_ok("<rid>3</rid><update_id>2</update_id>");
        let mut values = FieldValuePairs::new();
        values.add_by_id(9, "Closed");
        let edited = client
            .edit_records("bdb5rjd6h", &values, &Selector::All)
            .await
            .unwrap();
        assert_eq!(edited, 2);
    }

    #[tokio::test]
    async fn test_records_as_json_formats_values() {
        let mut client = client_with_schema();
        client
            .transport()
            .push_ok(&records_xml(&[(1, &[(6, "Kim"), (7, "10")])]));
        let json = client
            .records_as_json("bdb5rjd6h", &["Customer", "Amount"], &Selector::All)
            .await
            .unwrap();
        assert_eq!(json, r#"[{"Customer":"Kim","Amount":"$10.00"}]"#);
    }

    #[tokio::test]
    async fn test_join_requires_two_tables() {
        let mut client = Client::new(MockTransport::default());
        let err = client.join(&[]).await.unwrap_err();
        assert!(matches!(err, QdbError::InvalidArgument(_)));
    }
}
