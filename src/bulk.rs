//! 집계와 일괄 처리 헬퍼
//!
//! 최소/최대/합계/개수/평균은 쿼리 한 번의 결과를 필드 기본 타입에 맞게 변환해 계산합니다.
//! 빈 값은 집계에서 제외합니다.
//!
//! 일괄 수정/삭제는 레코드 단위 실패가 나머지 작업을 멈추지 않으며 성공 수만 돌려줍니다.

use std::cmp::Ordering;
use std::collections::HashMap;

use tracing::debug;

use crate::api::{FieldValuePairs, WriteOptions};
use crate::client::Client;
use crate::constants::RECORD_ID_FID;
use crate::error::Result;
use crate::query::QueryOptions;
use crate::schema::is_built_in_field;
use crate::transport::Transport;
use crate::types::{BaseType, DuplicatePolicy, FieldValue, Selector};

/// 필드 이름별 집계 결과 (요청 순서)
pub type Aggregates = Vec<(String, FieldValue)>;

/// 값이 같은 레코드 묶음
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateGroup {
    /// 비교에 쓴 필드 값 (요청 순서)
    pub values: Vec<String>,
    /// 문서 순서의 레코드 ID
    pub record_ids: Vec<u64>,
}

/// `value`가 `total`의 몇 퍼센트인지. `total`이 0이면 1로 봅니다.
///
/// # 예시
///
/// ```
/// use qdbapi::bulk::percent;
///
/// assert_eq!(percent(200.0, 50.0), 25.0);
/// assert_eq!(percent(0.0, 3.0), 300.0);
/// ```
pub fn percent(total: f64, value: f64) -> f64 {
    let total = if total == 0.0 { 1.0 } else { total };
    value / total * 100.0
}

/// 두 값의 차이의 절댓값
pub fn deviation(a: f64, b: f64) -> f64 {
    (a - b).abs()
}

fn compare(a: &FieldValue, b: &FieldValue) -> Ordering {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

fn add(total: FieldValue, value: &FieldValue) -> FieldValue {
    match (total, value) {
        (FieldValue::Int(t), FieldValue::Int(v)) => match t.checked_add(*v) {
            Some(sum) => FieldValue::Int(sum),
            None => FieldValue::Float(t as f64 + *v as f64),
        },
        (FieldValue::Text(mut t), FieldValue::Text(v)) => {
            t.push_str(v);
            FieldValue::Text(t)
        }
        (total, value) => FieldValue::Float(
            total.as_f64().unwrap_or(0.0) + value.as_f64().unwrap_or(0.0),
        ),
    }
}

fn non_empty(aggregates: Aggregates) -> Option<Aggregates> {
    (!aggregates.is_empty()).then_some(aggregates)
}

impl<T: Transport> Client<T> {
    /// 필드별로 비어 있지 않은 값을 기본 타입에 맞게 변환해 모읍니다.
    async fn typed_values<S: AsRef<str>>(
        &mut self,
        table_id: &str,
        names: &[S],
        selector: &Selector,
    ) -> Result<Vec<(String, Vec<FieldValue>)>> {
        let schema = self.get_schema(table_id).await?;
        let values = self
            .fetch_with_schema(&schema, table_id, names, selector, &QueryOptions::default())
            .await?;
        let mut typed = Vec::new();
        for name in values.names() {
            let base_type = schema
                .field_by_name(name)
                .map_or(BaseType::Text, |f| f.base_type);
            let column = values
                .column(name)
                .unwrap_or_default()
                .iter()
                .map(|raw| FieldValue::coerce(raw, base_type))
                .filter(|v| !v.is_null())
                .collect();
            typed.push((name.to_string(), column));
        }
        Ok(typed)
    }

    /// 필드별 최솟값. 값이 하나도 없으면 `None`.
    pub async fn min<S: AsRef<str>>(
        &mut self,
        table_id: &str,
        names: &[S],
        selector: &Selector,
    ) -> Result<Option<Aggregates>> {
        let typed = self.typed_values(table_id, names, selector).await?;
        Ok(non_empty(
            typed
                .into_iter()
                .filter_map(|(name, values)| {
                    Some((name, values.into_iter().min_by(|a, b| compare(a, b))?))
                })
                .collect(),
        ))
    }

    /// 필드별 최댓값. 값이 하나도 없으면 `None`.
    pub async fn max<S: AsRef<str>>(
        &mut self,
        table_id: &str,
        names: &[S],
        selector: &Selector,
    ) -> Result<Option<Aggregates>> {
        let typed = self.typed_values(table_id, names, selector).await?;
        Ok(non_empty(
            typed
                .into_iter()
                .filter_map(|(name, values)| {
                    Some((name, values.into_iter().max_by(|a, b| compare(a, b))?))
                })
                .collect(),
        ))
    }

    /// 필드별 합계. 텍스트 필드는 값을 이어 붙입니다.
    pub async fn sum<S: AsRef<str>>(
        &mut self,
        table_id: &str,
        names: &[S],
        selector: &Selector,
    ) -> Result<Option<Aggregates>> {
        let typed = self.typed_values(table_id, names, selector).await?;
        Ok(non_empty(
            typed
                .into_iter()
                .filter_map(|(name, values)| {
                    let mut iter = values.into_iter();
                    let first = iter.next()?;
                    Some((name, iter.fold(first, |total, v| add(total, &v))))
                })
                .collect(),
        ))
    }

    /// 필드별 비어 있지 않은 값의 개수. 모두 0이면 `None`.
    pub async fn count<S: AsRef<str>>(
        &mut self,
        table_id: &str,
        names: &[S],
        selector: &Selector,
    ) -> Result<Option<Vec<(String, usize)>>> {
        let typed = self.typed_values(table_id, names, selector).await?;
        let counts: Vec<(String, usize)> = typed
            .into_iter()
            .map(|(name, values)| (name, values.len()))
            .collect();
        Ok(counts.iter().any(|(_, c)| *c > 0).then_some(counts))
    }

    /// 숫자 필드별 평균 (항상 실수)
    pub async fn average<S: AsRef<str>>(
        &mut self,
        table_id: &str,
        names: &[S],
        selector: &Selector,
    ) -> Result<Option<Aggregates>> {
        let typed = self.typed_values(table_id, names, selector).await?;
        Ok(non_empty(
            typed
                .into_iter()
                .filter_map(|(name, values)| {
                    let numbers: Vec<f64> = values.iter().filter_map(FieldValue::as_f64).collect();
                    if numbers.is_empty() {
                        return None;
                    }
                    let average = numbers.iter().sum::<f64>() / numbers.len() as f64;
                    Some((name, FieldValue::Float(average)))
                })
                .collect(),
        ))
    }

    /// 숫자 필드 합계에 대한 각 레코드 값의 백분율을 `percent_field`에 기록합니다.
    pub async fn apply_percent_to_records(
        &mut self,
        table_id: &str,
        numeric_field: &str,
        percent_field: &str,
        selector: &Selector,
    ) -> Result<usize> {
        let total = self
            .sum(table_id, &[numeric_field], selector)
            .await?
            .and_then(|s| s.first().and_then(|(_, v)| v.as_f64()))
            .unwrap_or(0.0);
        self.apply_to_records(table_id, numeric_field, percent_field, selector, |v| {
            percent(total, v)
        })
        .await
    }

    /// 숫자 필드 평균과 각 레코드 값의 편차를 `deviation_field`에 기록합니다.
    pub async fn apply_deviation_to_records(
        &mut self,
        table_id: &str,
        numeric_field: &str,
        deviation_field: &str,
        selector: &Selector,
    ) -> Result<usize> {
        let average = self
            .average(table_id, &[numeric_field], selector)
            .await?
            .and_then(|a| a.first().and_then(|(_, v)| v.as_f64()))
            .unwrap_or(0.0);
        self.apply_to_records(table_id, numeric_field, deviation_field, selector, |v| {
            deviation(average, v)
        })
        .await
    }

    async fn apply_to_records<F>(
        &mut self,
        table_id: &str,
        source_field: &str,
        target_field: &str,
        selector: &Selector,
        compute: F,
    ) -> Result<usize>
    where
        F: Fn(f64) -> f64,
    {
        let rows = self
            .records(table_id, &[source_field, RECORD_ID_FID], selector)
            .await?;
        let mut edited = 0;
        for row in rows {
            let Some(rid) = row.get(RECORD_ID_FID).and_then(|r| r.parse().ok()) else {
                continue;
            };
            let value = row
                .get(source_field)
                .and_then(|v| v.trim().parse::<f64>().ok())
                .unwrap_or(0.0);
            let mut pairs = FieldValuePairs::new();
            pairs.add_by_name(target_field, compute(value).to_string());
            if self
                .edit_record(table_id, rid, &pairs, &WriteOptions::default())
                .await
                .is_ok()
            {
                edited += 1;
            }
        }
        Ok(edited)
    }

    /// 지정한 필드 값이 모두 같은 레코드 묶음 (두 개 이상인 묶음만, 처음 나온 순서)
    ///
    /// `ignore_case`면 값의 대소문자를 무시하고 비교합니다.
    pub async fn find_duplicate_record_ids<S: AsRef<str>>(
        &mut self,
        table_id: &str,
        names: &[S],
        selector: &Selector,
        ignore_case: bool,
    ) -> Result<Vec<DuplicateGroup>> {
        let mut fields: Vec<&str> = names.iter().map(|n| n.as_ref()).collect();
        fields.push(RECORD_ID_FID);
        let rows = self.records(table_id, &fields, selector).await?;

        let mut groups: Vec<DuplicateGroup> = Vec::new();
        let mut index: HashMap<Vec<String>, usize> = HashMap::new();
        for row in rows {
            let Some(rid) = row.get(RECORD_ID_FID).and_then(|r| r.parse().ok()) else {
                continue;
            };
            let values: Vec<String> = names
                .iter()
                .map(|n| row.get(n.as_ref()).unwrap_or_default().to_string())
                .collect();
            let key = if ignore_case {
                values.iter().map(|v| v.to_lowercase()).collect()
            } else {
                values.clone()
            };
            match index.get(&key) {
                Some(&i) => groups[i].record_ids.push(rid),
                None => {
                    index.insert(key, groups.len());
                    groups.push(DuplicateGroup {
                        values,
                        record_ids: vec![rid],
                    });
                }
            }
        }
        groups.retain(|g| g.record_ids.len() > 1);
        Ok(groups)
    }

    /// 중복 묶음마다 정책에 따라 한 레코드만 남기고 삭제합니다. 삭제 성공 수를 돌려줍니다.
    pub async fn delete_duplicate_records<S: AsRef<str>>(
        &mut self,
        table_id: &str,
        names: &[S],
        policy: DuplicatePolicy,
    ) -> Result<usize> {
        let groups = self
            .find_duplicate_record_ids(table_id, names, &Selector::All, true)
            .await?;
        let mut deleted = 0;
        for group in groups {
            let ids = &group.record_ids;
            let doomed = match policy {
                DuplicatePolicy::KeepFirst => &ids[1..],
                DuplicatePolicy::KeepLast => &ids[..ids.len() - 1],
            };
            for rid in doomed {
                if self.delete_record(table_id, *rid).await.is_ok() {
                    deleted += 1;
                }
            }
        }
        debug!(table_id, deleted, "duplicate records deleted");
        Ok(deleted)
    }

    /// 선택형 필드의 선택지. 필드가 없거나 선택지가 없으면 `None`.
    pub async fn get_field_choices(&mut self, table_id: &str, field_name: &str) -> Result<Option<Vec<String>>> {
        let schema = self.get_schema(table_id).await?;
        Ok(schema
            .choices(field_name)
            .filter(|c| !c.is_empty())
            .map(<[String]>::to_vec))
    }

    /// 테이블의 모든 레코드 ID
    pub async fn get_all_record_ids(&mut self, table_id: &str) -> Result<Vec<u64>> {
        let values = self
            .fetch_field_values(table_id, &[RECORD_ID_FID], &Selector::All)
            .await?;
        Ok(values
            .column(RECORD_ID_FID)
            .unwrap_or_default()
            .iter()
            .filter_map(|r| r.parse().ok())
            .collect())
    }

    /// 레코드의 사용자 필드 값을 복사해 `copies`개의 새 레코드를 만들고 새 레코드 ID를 돌려줍니다.
    pub async fn copy_record(&mut self, table_id: &str, rid: u64, copies: usize) -> Result<Vec<u64>> {
        let info = self.get_record_info(table_id, rid).await?;
        let mut pairs = FieldValuePairs::new();
        for field in info
            .fields
            .iter()
            .filter(|f| !is_built_in_field(f.id) && !f.value.is_empty())
        {
            pairs.add_by_id(field.id, field.value.clone());
        }
        if pairs.is_empty() {
            return Ok(Vec::new());
        }

        let mut new_ids = Vec::with_capacity(copies);
        for _ in 0..copies {
            let write = self
                .add_record(table_id, &pairs, &WriteOptions::default())
                .await?;
            new_ids.push(write.rid);
        }
        Ok(new_ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::tests::{client_with_schema, records_xml};

    #[test]
    fn test_percent_and_deviation() {
        assert_eq!(percent(50.0, 5.0), 10.0);
        assert_eq!(percent(0.0, 0.5), 50.0);
        assert_eq!(deviation(3.0, 10.0), 7.0);
        assert_eq!(deviation(10.0, 3.0), 7.0);
    }

    #[test]
    fn test_add_keeps_integer_sums() {
        assert_eq!(add(FieldValue::Int(2), &FieldValue::Int(3)), FieldValue::Int(5));
        assert_eq!(
            add(FieldValue::Float(1.5), &FieldValue::Int(1)),
            FieldValue::Float(2.5)
        );
        assert_eq!(
            add(FieldValue::Text("a".into()), &FieldValue::Text("b".into())),
            FieldValue::Text("ab".into())
        );
    }

    #[tokio::test]
    async fn test_min_max_sum_skip_empty() {
        let mut client = client_with_schema();
        let rows = records_xml(&[
            (1, &[(7, "10"), (6, "Kim")]),
            (2, &[(7, ""), (6, "Lee")]),
            (3, &[(7, "2.5"), (6, "Ahn")]),
        ]);
        client
            .transport()
            .push_ok(&rows)
            .push_schema()
            .push_ok(&rows)
            .push_schema()
            .push_ok(&rows)
            .push_schema()
            .push_ok(&rows);

        let min = client.min("bdb5rjd6h", &["Amount", "Customer"], &Selector::All).await.unwrap().unwrap();
        assert_eq!(min[0], ("Amount".to_string(), FieldValue::Float(2.5)));
        assert_eq!(min[1], ("Customer".to_string(), FieldValue::Text("Ahn".into())));

        let max = client.max("bdb5rjd6h", &["Amount"], &Selector::All).await.unwrap().unwrap();
        assert_eq!(max[0].1, FieldValue::Float(10.0));

        let sum = client.sum("bdb5rjd6h", &["Amount"], &Selector::All).await.unwrap().unwrap();
        assert_eq!(sum[0].1, FieldValue::Float(12.5));

        let count = client.count("bdb5rjd6h", &["Amount"], &Selector::All).await.unwrap().unwrap();
        assert_eq!(count, vec![("Amount".to_string(), 2)]);
    }

    #[tokio::test]
    async fn test_aggregates_none_without_values() {
        let mut client = client_with_schema();
        client
            .transport()
            .push_ok(&records_xml(&[]))
            .push_schema()
            .push_ok(&records_xml(&[]));
        assert!(client.average("bdb5rjd6h", &["Amount"], &Selector::All).await.unwrap().is_none());
        assert!(client.count("bdb5rjd6h", &["Amount"], &Selector::All).await.unwrap().is_none());
    }

    #[test]
    fn test_add_widens_on_overflow() {
        assert_eq!(
            add(FieldValue::Int(i64::MAX), &FieldValue::Int(1)),
            FieldValue::Float(i64::MAX as f64 + 1.0)
        );
    }

    #[tokio::test]
    async fn test_sum_by_field_id_uses_base_type() {
        let mut client = client_with_schema();
        client
            .transport()
            .push_ok(&records_xml(&[(1, &[(7, "1.25")]), (2, &[(7, "2")])]));
        let sum = client.sum("bdb5rjd6h", &["7"], &Selector::All).await.unwrap().unwrap();
        assert_eq!(sum, vec![("7".to_string(), FieldValue::Float(3.25))]);
    }

    #[tokio::test]
    async fn test_average_is_float() {
        let mut client = client_with_schema();
        client
            .transport()
            .push_ok(&records_xml(&[(1, &[(8, "3")]), (2, &[(8, "4")])]));
        let avg = client.average("bdb5rjd6h", &["Rating"], &Selector::All).await.unwrap().unwrap();
        assert_eq!(avg[0].1, FieldValue::Float(3.5));
    }

    #[tokio::test]
    async fn test_find_duplicates_first_occurrence_order() {
        let mut client = client_with_schema();
        client.transport().push_ok(&records_xml(&[
            (1, &[(6, "Kim"), (3, "1")]),
            (2, &[(6, "Lee"), (3, "2")]),
            (3, &[(6, "kim"), (3, "3")]),
            (4, &[(6, "Lee"), (3, "4")]),
            (5, &[(6, "Park"), (3, "5")]),
        ]));
        let groups = client
            .find_duplicate_record_ids("bdb5rjd6h", &["Customer"], &Selector::All, true)
            .await
            .unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].values, vec!["Kim"]);
        assert_eq!(groups[0].record_ids, vec![1, 3]);
        assert_eq!(groups[1].record_ids, vec![2, 4]);
        assert!(client.transport().last_body().contains("<clist>6.3</clist>"));
    }

    #[tokio::test]
    async fn test_delete_duplicates_keep_last_counts_successes() {
        let mut client = client_with_schema();
        client
            .transport()
            .push_ok(&records_xml(&[
                (1, &[(6, "Kim"), (3, "1")]),
                (2, &[(6, "Kim"), (3, "2")]),
                (3, &[(6, "Kim"), (3, "3")]),
            ]))
            .push_ok("")
            .push_error("30", "No such record");
        let deleted = client
            .delete_duplicate_records("bdb5rjd6h", &["Customer"], DuplicatePolicy::KeepLast)
            .await
            .unwrap();
        assert_eq!(deleted, 1);
        let requests = client.transport().requests();
        assert!(requests[2].body.contains("<rid>1</rid>"));
        assert!(requests[3].body.contains("<rid>2</rid>"));
    }

    #[tokio::test]
    async fn test_apply_percent_to_records() {
        let mut client = client_with_schema();
        let rows = records_xml(&[(1, &[(7, "30"), (3, "1")]), (2, &[(7, "10"), (3, "2")])]);
        client
            .transport()
            .push_ok(&rows)
            .push_schema()
            .push_ok(&rows)
            .push_ok("<rid>1</rid>")
            .push_ok("<rid>2</rid>");
        let edited = client
            .apply_percent_to_records("bdb5rjd6h", "Amount", "Share", &Selector::All)
            .await
            .unwrap();
        assert_eq!(edited, 2);
        let requests = client.transport().requests();
        assert!(requests[4].body.contains("<field name='share'>75</field>"));
        assert!(requests[5].body.contains("<field name='share'>25</field>"));
    }

    #[tokio::test]
    async fn test_field_choices_and_record_ids() {
        let mut client = client_with_schema();
        client
            .transport()
            .push_schema()
            .push_schema()
            .push_ok(&records_xml(&[(4, &[(3, "4")]), (9, &[(3, "9")])]));
        let choices = client.get_field_choices("bdb5rjd6h", "status").await.unwrap();
        assert_eq!(choices, Some(vec!["Open".to_string(), "Closed".to_string()]));
        assert_eq!(client.get_field_choices("bdb5rjd6h", "Customer").await.unwrap(), None);
        assert_eq!(client.get_all_record_ids("bdb5rjd6h").await.unwrap(), vec![4, 9]);
    }

    #[tokio::test]
    async fn test_copy_record_skips_built_in_fields() {
        let mut client = Client::new(crate::transport::mock::MockTransport::default());
        client.set_ticket(Some("T1"));
        client
            .transport()
            .push_ok(
                "<rid>4</rid><update_id>1</update_id>\
                 <field><fid>1</fid><name>Date Created</name><type>Date / Time</type><value>1</value></field>\
                 <field><fid>6</fid><name>Customer</name><type>Text</type><value>Kim</value></field>\
                 <field><fid>7</fid><name>Amount</name><type>Numeric</type><value></value></field>",
            )
            .push_ok("<rid>20</rid>")
            .push_ok("<rid>21</rid>");
        let ids = client.copy_record("abc", 4, 2).await.unwrap();
        assert_eq!(ids, vec![20, 21]);
        let body = client.transport().last_body();
        assert!(body.contains("<field fid='6'>Kim</field>"));
        assert!(!body.contains("fid='1'"));
        assert!(!body.contains("fid='7'"));
    }
}
