//! 통합 테스트: 공개 API만으로 모듈 간 연동을 검증합니다.
//!
//! - 메모리 내 전송 계층으로 요청/응답 흐름 재현
//! - 조회, 조인, 유니온, 그룹 집계 파이프라인
//! - 컨텍스트 전이와 에러 전파
//! - SQL 번역

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use qdbapi::encoding::{decode_xml, encode_xml, is_base32_id};
use qdbapi::resolve::{classify, Identifier};
use qdbapi::schema::is_built_in_field;
use qdbapi::sql::parse_select;
use qdbapi::transport::{HttpRequest, HttpResponse, Transport};
use qdbapi::xml::{parse, ParseOptions};
use qdbapi::{
    Client, ClientEvent, DuplicatePolicy, JoinSpec, QdbError, Schema, Selector, UnionSpec,
};

const ORDERS: &str = "bdb5rjd6h";
const CUSTOMERS: &str = "bdcagynhs";

/// 준비된 응답을 순서대로 돌려주는 전송 계층
#[derive(Default)]
struct ScriptedTransport {
    responses: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    fn push(&self, body: String) -> &Self {
        self.responses.lock().unwrap().push_back(body);
        self
    }

    fn push_ok(&self, inner: &str) -> &Self {
        self.push(format!(
            "<qdbapi><errcode>0</errcode><errtext>No error</errtext>{inner}</qdbapi>"
        ))
    }

    fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn bodies(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.body.clone())
            .collect()
    }
}

impl Transport for ScriptedTransport {
    async fn send(&self, request: &HttpRequest) -> qdbapi::Result<HttpResponse> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .map(HttpResponse::ok)
            .ok_or_else(|| QdbError::InvalidArgument("script exhausted".to_string()))
    }
}

/// `<table>` 스키마 조각. 필드는 (fid, 라벨, field_type, base_type, 추가 자식 엘리먼트)
fn schema_inner(name: &str, fields: &[(u32, &str, &str, &str, &str)]) -> String {
    let mut xml = format!("<table><name>{name}</name><fields>");
    for (fid, label, field_type, base_type, extra) in fields {
        xml.push_str(&format!(
            "<field id=\"{fid}\" field_type=\"{field_type}\" base_type=\"{base_type}\">\
             <label>{label}</label>{extra}</field>"
        ));
    }
    xml.push_str("</fields></table>");
    xml
}

fn orders_schema() -> String {
    schema_inner(
        "Orders",
        &[
            (3, "Record ID#", "recordid", "int32", ""),
            (6, "Customer", "text", "text", ""),
            (7, "Amount", "currency", "float", "<does_total>1</does_total>"),
            (8, "Rating", "float", "float", "<does_average>1</does_average>"),
            (9, "Status", "text", "text", ""),
        ],
    )
}

fn customers_schema() -> String {
    schema_inner(
        "Customers",
        &[
            (3, "Record ID#", "recordid", "int32", ""),
            (6, "Customer", "text", "text", ""),
            (7, "Region", "text", "text", ""),
        ],
    )
}

fn records(rows: &[(u64, &[(u32, &str)])]) -> String {
    let mut xml = String::from("<table><records>");
    for (rid, fields) in rows {
        xml.push_str(&format!("<record rid=\"{rid}\">"));
        for (fid, value) in *fields {
            xml.push_str(&format!("<f id=\"{fid}\">{value}</f>"));
        }
        xml.push_str("</record>");
    }
    xml.push_str("</records></table>");
    xml
}

fn client() -> Client<ScriptedTransport> {
    let mut client = Client::new(ScriptedTransport::default());
    client.set_ticket(Some("T1"));
    client
}

#[test]
fn built_in_field_boundary() {
    assert!((0..=5).all(is_built_in_field));
    assert!((6..=100).all(|fid| !is_built_in_field(fid)));
}

#[test]
fn xml_escape_round_trip() {
    for text in ["plain", "Tom & Jerry", "<b>'quoted' \"both\"</b>", "a&amp;b", ""] {
        assert_eq!(decode_xml(&encode_xml(text)), text);
    }
    assert!(!encode_xml("<&>'\"").contains(['<', '>', '\'', '"']));

    for encoded in ["&amp;", "&lt;", "&gt;", "&apos;", "&quot;", "a &lt;b&gt; &amp; &apos;c&apos;"] {
        assert_eq!(encode_xml(&decode_xml(encoded)), encoded);
    }
}

#[test]
fn identifier_shapes() {
    assert!(is_base32_id(ORDERS));
    assert!(!is_base32_id("Orders"));
    assert_eq!(classify("rid_9"), Some(Identifier::Record(9)));
    assert_eq!(classify(CUSTOMERS), Some(Identifier::Table(CUSTOMERS.to_string())));
}

#[tokio::test]
async fn field_values_columns_have_equal_length() {
    let mut client = client();
    client
        .transport()
        .push_ok(&orders_schema())
        .push_ok(&records(&[
            (1, &[(6, "Kim"), (7, "10")]),
            (2, &[(7, "20")]),
            (3, &[(6, "Park")]),
        ]));

    let values = client
        .fetch_field_values(ORDERS, &["Customer", "Amount", "Nope"], &Selector::All)
        .await
        .unwrap();
    assert_eq!(values.len(), 3);
    assert_eq!(values.column("Customer").unwrap(), ["Kim", "", "Park"]);
    assert_eq!(values.column("Amount").unwrap(), ["10", "20", ""]);
    assert_eq!(values.column("Nope").unwrap(), ["", "", ""]);
}

#[tokio::test]
async fn inner_join_drops_unmatched_rows() {
    let mut client = client();
    client
        .transport()
        .push_ok(&orders_schema())
        .push_ok(&records(&[
            (1, &[(7, "10"), (6, "Kim")]),
            (2, &[(7, "20"), (6, "Lee")]),
            (3, &[(7, "5"), (6, "Park")]),
        ]))
        .push_ok(&customers_schema())
        .push_ok(&records(&[
            (1, &[(7, "EMEA"), (6, "Kim")]),
            (2, &[(7, "APAC"), (6, "Park")]),
            (3, &[(7, "LATAM"), (6, "Park")]),
        ]));

    let joined = client
        .join(&[
            JoinSpec {
                table_id: ORDERS.to_string(),
                selector: Selector::All,
                join_field: "Customer".to_string(),
                fields: vec!["Amount".to_string()],
            },
            JoinSpec {
                table_id: CUSTOMERS.to_string(),
                selector: Selector::All,
                join_field: "Customer".to_string(),
                fields: vec!["Region".to_string()],
            },
        ])
        .await
        .unwrap();

    let rows: Vec<(&str, &str, &str)> = joined
        .iter()
        .map(|r| {
            (
                r.get("Customer").unwrap(),
                r.get("Amount").unwrap(),
                r.get("Region").unwrap(),
            )
        })
        .collect();
    assert_eq!(
        rows,
        vec![
            ("Kim", "10", "EMEA"),
            ("Park", "5", "APAC"),
            ("Park", "5", "LATAM"),
        ]
    );
}

#[tokio::test]
async fn union_removes_duplicate_rows() {
    let mut client = client();
    client
        .transport()
        .push_ok(&customers_schema())
        .push_ok(&records(&[
            (1, &[(6, "Kim"), (7, "EMEA")]),
            (2, &[(6, "Lee"), (7, "APAC")]),
        ]))
        .push_ok(&customers_schema())
        .push_ok(&records(&[
            (1, &[(6, "Kim"), (7, "EMEA")]),
            (2, &[(6, "Park"), (7, "EMEA")]),
        ]));

    let combined = client
        .union(
            &[
                UnionSpec {
                    table_id: CUSTOMERS.to_string(),
                    selector: Selector::All,
                },
                UnionSpec {
                    table_id: "bdcagynht".to_string(),
                    selector: Selector::All,
                },
            ],
            &["Customer", "Region"],
        )
        .await
        .unwrap();
    assert_eq!(combined.column("Customer").unwrap(), ["Kim", "Lee", "Park"]);
    assert_eq!(combined.column("Region").unwrap(), ["EMEA", "APAC", "EMEA"]);
}

#[tokio::test]
async fn summary_groups_totals_and_averages() {
    let mut client = client();
    client
        .transport()
        .push_ok(&orders_schema())
        .push_ok(&records(&[
            (1, &[(6, "B"), (7, "5"), (8, "4")]),
            (2, &[(6, "A"), (7, "10"), (8, "3")]),
            (3, &[(6, "A"), (7, "20"), (8, "")]),
        ]));

    let summary = client
        .summary(ORDERS, &["Customer", "Amount", "Rating"], &Selector::All)
        .await
        .unwrap();
    assert_eq!(summary.len(), 2);

    let a = &summary[0];
    assert_eq!(a.get("Customer"), Some("A"));
    assert_eq!(a.get("Amount:Total"), Some("30"));
    assert_eq!(a.get("Rating:Average"), Some("1.5"));
    assert_eq!(a.get("Count"), Some("2"));

    let b = &summary[1];
    assert_eq!(b.get("Customer"), Some("B"));
    assert_eq!(b.get("Amount:Total"), Some("5"));
    assert_eq!(b.get("Count"), Some("1"));
}

#[test]
fn context_transitions_notify_subscribers() {
    let mut client = client();
    let events: Arc<Mutex<Vec<ClientEvent>>> = Arc::default();
    let sink = Arc::clone(&events);
    client.subscribe(move |event: &ClientEvent| sink.lock().unwrap().push(event.clone()));

    client.set_active_table(Some(ORDERS));
    client.set_active_record(Some(4));
    client.set_active_field(Some(7));
    assert_eq!(client.active_record(), Some(4));

    client.set_active_table(Some(CUSTOMERS));
    assert_eq!(client.active_table(), Some(CUSTOMERS));
    assert_eq!(client.active_record(), None);
    assert_eq!(client.active_field(), None);

    assert_eq!(
        *events.lock().unwrap(),
        vec![
            ClientEvent::TableChanged(ORDERS.to_string()),
            ClientEvent::RecordChanged(4),
            ClientEvent::FieldChanged(7),
            ClientEvent::TableChanged(CUSTOMERS.to_string()),
        ]
    );
}

#[tokio::test]
async fn success_flag_tracks_last_request() {
    let mut client = client();
    client.transport().push(
        "<qdbapi><errcode>4</errcode><errtext>Bad ticket</errtext><errdetail>expired</errdetail></qdbapi>"
            .to_string(),
    );
    let err = client.get_schema(ORDERS).await.unwrap_err();
    assert!(matches!(err, QdbError::Protocol { ref code, .. } if code == "4"));
    assert!(!client.request_succeeded());
    assert_eq!(client.last_error(), "Error code: 4 text: Bad ticket: detail: expired");

    client.transport().push_ok(&orders_schema());
    client.get_schema(ORDERS).await.unwrap();
    assert!(client.request_succeeded());
    assert_eq!(client.last_error(), "");
}

#[tokio::test]
async fn stop_on_error_blocks_further_requests() {
    let mut client = client();
    client.set_stop_on_error(true);
    client.transport().push(
        "<qdbapi><errcode>4</errcode><errtext>Bad ticket</errtext></qdbapi>".to_string(),
    );
    assert!(client.get_schema(ORDERS).await.is_err());
    assert!(matches!(
        client.get_schema(ORDERS).await,
        Err(QdbError::Stopped { .. })
    ));
    assert_eq!(client.transport().request_count(), 1);
}

#[tokio::test]
async fn schema_cache_serves_repeat_requests() {
    let mut client = client();
    client.set_cache_schemas(true);
    client.transport().push_ok(&orders_schema());

    let first = client.get_schema(ORDERS).await.unwrap();
    let second = client.get_schema(ORDERS).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.field_id("amount"), Some(7));
    assert_eq!(client.transport().request_count(), 1);
}

#[tokio::test]
async fn missing_auth_is_rejected_before_network() {
    let mut client = Client::new(ScriptedTransport::default());
    assert!(matches!(
        client.get_schema(ORDERS).await,
        Err(QdbError::NotAuthenticated { .. })
    ));
    assert_eq!(client.transport().request_count(), 0);
    assert!(!client.request_succeeded());
    assert!(!client.last_error().is_empty());
}

#[test]
fn sql_translates_to_query_parts() {
    let root = parse(
        &format!("<qdbapi><errcode>0</errcode>{}</qdbapi>", orders_schema()),
        &ParseOptions::default(),
    )
    .unwrap();
    let schema = Schema::from_root(ORDERS, &root).unwrap();

    let parts = parse_select(
        "SELECT Customer, Amount FROM Orders WHERE Status = 'Open' OR Customer <> 'Kim' \
         ORDER BY Amount DESC LIMIT 20",
    )
    .unwrap()
    .to_query_parts(&schema)
    .unwrap();
    assert_eq!(parts.clist.as_deref(), Some("6.7"));
    assert_eq!(
        parts.criteria.as_deref(),
        Some("{'9'.TV.'Open'}OR{'6'.XTV.'Kim'}")
    );
    assert_eq!(parts.slist.as_deref(), Some("7"));
    assert_eq!(parts.options.as_deref(), Some("num-20.sortorder-D"));

    assert!(matches!(
        parse_select("SELECT FROM Orders"),
        Err(QdbError::SqlSyntax { .. })
    ));
}

#[tokio::test]
async fn duplicates_found_and_deleted() {
    let mut client = client();
    client
        .transport()
        .push_ok(&orders_schema())
        .push_ok(&records(&[
            (1, &[(6, "Kim"), (3, "1")]),
            (2, &[(6, "Lee"), (3, "2")]),
            (3, &[(6, "kim"), (3, "3")]),
            (4, &[(6, "Kim"), (3, "4")]),
        ]))
        .push_ok("")
        .push_ok("");

    let deleted = client
        .delete_duplicate_records(ORDERS, &["Customer"], DuplicatePolicy::KeepFirst)
        .await
        .unwrap();
    assert_eq!(deleted, 2);

    let bodies = client.transport().bodies();
    assert!(bodies[2].contains("<rid>3</rid>"));
    assert!(bodies[3].contains("<rid>4</rid>"));
}
