//! 프로토콜 오퍼레이션: 서버 API 호출 하나당 메서드 하나
//!
//! 각 메서드는 요청 페이로드를 만들고 [`Client::send_request`]로 보낸 뒤
//! 응답에서 필요한 값을 꺼내 전용 결과 타입으로 돌려줍니다.
//!
//! ## 카테고리
//!
//! - 세션: [`authenticate`](Client::authenticate), [`sign_out`](Client::sign_out), [`get_user_info`](Client::get_user_info)
//! - 애플리케이션/테이블: [`find_db_by_name`](Client::find_db_by_name), [`get_db_info`](Client::get_db_info),
//!   [`get_schema`](Client::get_schema), [`create_database`](Client::create_database), [`create_table`](Client::create_table)
//! - 레코드: [`add_record`](Client::add_record), [`edit_record`](Client::edit_record),
//!   [`delete_record`](Client::delete_record), [`purge_records`](Client::purge_records),
//!   [`import_from_csv`](Client::import_from_csv)
//! - 필드: [`add_field`](Client::add_field), [`set_field_properties`](Client::set_field_properties),
//!   [`field_add_choices`](Client::field_add_choices)

use std::str::FromStr;

use tracing::debug;

use crate::client::Client;
use crate::codec::{Request, Response};
use crate::constants::{field_type_for_label, is_valid_field_property, is_valid_field_type};
use crate::encoding::{encode_xml, split_separated};
use crate::error::{QdbError, Result};
use crate::schema::Schema;
use crate::transport::Transport;
use crate::types::Selector;

/// 인증 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthTicket {
    pub ticket: String,
    pub user_id: String,
}

/// `getDBInfo` 결과
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DbInfo {
    pub name: String,
    /// 마지막 레코드 변경 시각 (epoch 밀리초 문자열)
    pub last_rec_mod_time: String,
    pub last_modified_time: String,
    pub created_time: String,
    pub num_records: u64,
    pub manager_id: String,
    pub manager_name: String,
    pub version: String,
}

/// 접근 권한이 있는 애플리케이션/테이블
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantedDb {
    pub name: String,
    pub dbid: String,
}

/// `grantedDBs` 요청 옵션
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GrantedDbsOptions {
    pub with_embedded_tables: bool,
    pub exclude_parents: bool,
    pub admin_only: bool,
    pub include_ancestors: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserInfo {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub login: String,
    pub email: String,
    pub screen_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedDatabase {
    pub dbid: String,
    pub app_dbid: String,
    pub app_token: Option<String>,
}

/// `getRecordInfo`의 필드 하나
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordField {
    pub id: u32,
    pub name: String,
    pub field_type: String,
    pub value: String,
}

/// `getRecordInfo` 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordInfo {
    pub rid: u64,
    pub update_id: String,
    pub fields: Vec<RecordField>,
}

impl RecordInfo {
    /// 필드 이름으로 값을 찾습니다 (대소문자 무시).
    pub fn value(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(name))
            .map(|f| f.value.as_str())
    }
}

/// 레코드 추가/수정 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordWrite {
    pub rid: u64,
    /// 다음 수정에 넘길 변경 추적 ID
    pub update_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewField {
    pub fid: u32,
    pub label: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportResult {
    pub input: u64,
    pub added: u64,
    pub updated: u64,
    pub rids: Vec<u64>,
}

/// `obStatus` 결과: 응답 루트의 에러 정보 외 모든 값
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerStatus {
    pub values: Vec<(String, String)>,
}

impl ServerStatus {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

/// 레코드 추가/수정 요청 옵션
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteOptions {
    /// 알 수 없는 필드 등 일부 오류를 서버가 무시
    pub ignore_error: bool,
    /// 서버가 거부하도록 제시할 이전 update_id (낙관적 동시성 제어)
    pub update_id: Option<String>,
    /// 날짜 값을 UTC 밀리초로 해석
    pub ms_in_utc: bool,
}

impl WriteOptions {
    fn apply(&self, request: Request) -> Request {
        request
            .flag("ignoreError", self.ignore_error)
            .field_opt("update_id", self.update_id.as_deref())
            .flag("msInUTC", self.ms_in_utc)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum FieldRef {
    Id(u32),
    Name(String),
}

/// 레코드 추가/수정에 넘길 필드-값 목록
///
/// # 예시
///
/// ```
/// use qdbapi::api::FieldValuePairs;
///
/// let mut pairs = FieldValuePairs::new();
/// pairs.add_by_id(6, "Kim & Lee").add_by_name("Due Date", "01-02-2024");
/// assert_eq!(
///     pairs.to_xml(),
///     "<field fid='6'>Kim &amp; Lee</field><field name='due_date'>01-02-2024</field>"
/// );
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldValuePairs {
    pairs: Vec<(FieldRef, String)>,
}

impl FieldValuePairs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_by_id(&mut self, fid: u32, value: impl Into<String>) -> &mut Self {
        self.pairs.push((FieldRef::Id(fid), value.into()));
        self
    }

    /// 이름은 소문자로 바꾸고 단어 문자가 아닌 글자는 `_`로 치환합니다.
    pub fn add_by_name(&mut self, name: &str, value: impl Into<String>) -> &mut Self {
        let normalized = name
            .to_lowercase()
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
            .collect();
        self.pairs.push((FieldRef::Name(normalized), value.into()));
        self
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn to_xml(&self) -> String {
        self.pairs
            .iter()
            .map(|(field, value)| {
                let value = encode_xml(value);
                match field {
                    FieldRef::Id(fid) => format!("<field fid='{fid}'>{value}</field>"),
                    FieldRef::Name(name) => format!("<field name='{name}'>{value}</field>"),
                }
            })
            .collect()
    }
}

/// 응답 최상위 값을 숫자로 읽습니다.
pub(crate) fn parse_value<N: FromStr>(response: &Response, name: &str) -> Result<N> {
    response
        .value(name)
        .and_then(|v| v.trim().parse().ok())
        .ok_or_else(|| QdbError::MalformedResponse(name.to_string()))
}

fn text_value(response: &Response, name: &str) -> String {
    response.value(name).unwrap_or_default().to_string()
}

impl<T: Transport> Client<T> {
    /// 사용자명/비밀번호로 인증하고 받은 티켓을 세션에 저장합니다.
    ///
    /// `hours`를 주면 티켓 유효 시간을 지정합니다.
    pub async fn authenticate(
        &mut self,
        username: &str,
        password: &str,
        hours: Option<u32>,
    ) -> Result<AuthTicket> {
        let hours = hours.map(|h| h.to_string());
        let request = Request::new("authenticate")
            .field("username", username)
            .field("password", password)
            .field_opt("hours", hours.as_deref());
        let resp = self.send_request(request).await?;

        let ticket = resp
            .value("ticket")
            .ok_or_else(|| QdbError::MalformedResponse("ticket".to_string()))?
            .to_string();
        self.set_ticket(Some(&ticket));
        self.set_credentials(username, password);
        Ok(AuthTicket {
            ticket,
            user_id: text_value(&resp, "userid"),
        })
    }

    /// 서버 세션을 끝내고 로컬 인증 정보를 지웁니다.
    pub async fn sign_out(&mut self) -> Result<()> {
        self.send_request(Request::new("signOut")).await?;
        self.session_mut().clear_auth();
        Ok(())
    }

    /// 이름으로 애플리케이션을 찾습니다. 찾으면 활성 테이블이 됩니다.
    pub async fn find_db_by_name(&mut self, name: &str) -> Result<Option<String>> {
        let resp = self
            .send_request(Request::new("findDBByName").field("dbname", name))
            .await?;
        let dbid = resp.value("dbid").map(str::to_string);
        if let Some(id) = &dbid {
            self.set_active_table(Some(id));
        }
        Ok(dbid)
    }

    pub async fn get_db_info(&mut self, table_id: &str) -> Result<DbInfo> {
        let resp = self
            .send_request(Request::for_table("getDBInfo", table_id))
            .await?;
        Ok(DbInfo {
            name: text_value(&resp, "dbname"),
            last_rec_mod_time: text_value(&resp, "lastRecModTime"),
            last_modified_time: text_value(&resp, "lastModifiedTime"),
            created_time: text_value(&resp, "createdTime"),
            num_records: parse_value(&resp, "numRecords").unwrap_or(0),
            manager_id: text_value(&resp, "mgrID"),
            manager_name: text_value(&resp, "mgrName"),
            version: text_value(&resp, "version"),
        })
    }

    /// 테이블 스키마를 가져와 활성 스키마로 설정합니다.
    ///
    /// 스키마 캐시가 켜져 있고 항목이 있으면 네트워크 요청 없이 캐시 복제본을 씁니다.
    ///
    /// # 에러
    ///
    /// - [`QdbError::MalformedResponse`]: 응답에 `table` 엘리먼트가 없음
    /// - 그 외 [`Client::send_request`]의 에러
    pub async fn get_schema(&mut self, table_id: &str) -> Result<Schema> {
        if self.cache_schemas() {
            if let Some(schema) = self.schema_cache().get(table_id) {
                debug!(table_id, "schema served from cache");
                self.set_active_table(Some(table_id));
                self.set_schema(schema.clone());
                return Ok(schema);
            }
        }

        let resp = self
            .send_request(Request::for_table("getSchema", table_id))
            .await?;
        let schema = Schema::from_root(table_id, resp.root())?;
        if self.cache_schemas() {
            self.schema_cache_mut().insert(&schema);
        }
        self.set_schema(schema.clone());
        Ok(schema)
    }

    /// 선택자에 일치하는 레코드 수
    pub async fn do_query_count(&mut self, table_id: &str, selector: &Selector) -> Result<u64> {
        let (tag, value) = selector.request_field();
        let resp = self
            .send_request(Request::for_table("doQueryCount", table_id).field(tag, value))
            .await?;
        parse_value(&resp, "numMatches")
    }

    /// 테이블 전체 레코드 수
    pub async fn get_num_records(&mut self, table_id: &str) -> Result<u64> {
        let resp = self
            .send_request(Request::for_table("getNumRecords", table_id))
            .await?;
        parse_value(&resp, "num_records")
    }

    /// 레코드의 모든 필드 값과 update_id. 조회한 레코드가 활성 레코드가 됩니다.
    pub async fn get_record_info(&mut self, table_id: &str, rid: u64) -> Result<RecordInfo> {
        let resp = self
            .send_request(Request::for_table("getRecordInfo", table_id).field("rid", &rid.to_string()))
            .await?;
        let fields = resp
            .elements("field")
            .into_iter()
            .filter_map(|f| {
                Some(RecordField {
                    id: f.child_text("fid")?.trim().parse().ok()?,
                    name: f.child_text("name").unwrap_or_default().to_string(),
                    field_type: f.child_text("type").unwrap_or_default().to_string(),
                    value: f.child_text("value").unwrap_or_default().to_string(),
                })
            })
            .collect();
        self.set_active_record(Some(rid));
        Ok(RecordInfo {
            rid,
            update_id: text_value(&resp, "update_id"),
            fields,
        })
    }

    /// 레코드를 추가합니다. 새 레코드가 활성 레코드가 됩니다.
    pub async fn add_record(
        &mut self,
        table_id: &str,
        values: &FieldValuePairs,
        options: &WriteOptions,
    ) -> Result<RecordWrite> {
        let request = options.apply(Request::for_table("addRecord", table_id).raw(&values.to_xml()));
        let resp = self.send_request(request).await?;
        let rid = parse_value(&resp, "rid")?;
        self.set_active_record(Some(rid));
        Ok(RecordWrite {
            rid,
            update_id: text_value(&resp, "update_id"),
        })
    }

    /// 레코드를 수정합니다.
    ///
    /// `options.update_id`가 최신 값이 아니면 서버가 수정을 거부합니다.
    pub async fn edit_record(
        &mut self,
        table_id: &str,
        rid: u64,
        values: &FieldValuePairs,
        options: &WriteOptions,
    ) -> Result<RecordWrite> {
        let request = Request::for_table("editRecord", table_id)
            .field("rid", &rid.to_string())
            .raw(&values.to_xml());
        let resp = self.send_request(options.apply(request)).await?;
        let rid = parse_value(&resp, "rid").unwrap_or(rid);
        self.set_active_record(Some(rid));
        Ok(RecordWrite {
            rid,
            update_id: text_value(&resp, "update_id"),
        })
    }

    /// `rid`가 있으면 수정, 없으면 추가합니다.
    pub async fn add_or_edit_record(
        &mut self,
        table_id: &str,
        rid: Option<u64>,
        values: &FieldValuePairs,
    ) -> Result<RecordWrite> {
        match rid {
            Some(rid) => {
                self.edit_record(table_id, rid, values, &WriteOptions::default())
                    .await
            }
            None => {
                self.add_record(table_id, values, &WriteOptions::default())
                    .await
            }
        }
    }

    pub async fn delete_record(&mut self, table_id: &str, rid: u64) -> Result<()> {
        self.send_request(Request::for_table("deleteRecord", table_id).field("rid", &rid.to_string()))
            .await?;
        self.set_active_record(None);
        Ok(())
    }

    /// 선택자에 일치하는 레코드를 모두 삭제하고 삭제 수를 돌려줍니다.
    pub async fn purge_records(&mut self, table_id: &str, selector: &Selector) -> Result<u64> {
        let (tag, value) = selector.request_field();
        let resp = self
            .send_request(Request::for_table("purgeRecords", table_id).field(tag, value))
            .await?;
        parse_value(&resp, "num_records_deleted")
    }

    /// 필드를 추가합니다. `field_type`은 프로토콜 타입(`currency`) 또는 라벨(`Numeric-Currency`).
    ///
    /// # 에러
    ///
    /// - [`QdbError::InvalidFieldType`]: 허용되지 않는 타입 (요청을 보내지 않음)
    pub async fn add_field(
        &mut self,
        table_id: &str,
        label: &str,
        field_type: &str,
        mode: Option<&str>,
    ) -> Result<NewField> {
        let field_type = field_type_for_label(field_type).unwrap_or(field_type);
        if !is_valid_field_type(field_type) {
            return Err(QdbError::InvalidFieldType {
                field_type: field_type.to_string(),
            });
        }
        let request = Request::for_table("addField", table_id)
            .field("label", label)
            .field("type", field_type)
            .field_opt("mode", mode);
        let resp = self.send_request(request).await?;
        let fid = parse_value(&resp, "fid")?;
        self.set_active_field(Some(fid));
        Ok(NewField {
            fid,
            label: resp.value("label").unwrap_or(label).to_string(),
        })
    }

    pub async fn delete_field(&mut self, table_id: &str, fid: u32) -> Result<()> {
        self.send_request(Request::for_table("deleteField", table_id).field("fid", &fid.to_string()))
            .await?;
        self.set_active_field(None);
        Ok(())
    }

    /// 필드 속성을 설정합니다.
    ///
    /// # 에러
    ///
    /// - [`QdbError::InvalidFieldProperty`]: 허용되지 않는 속성 이름 (요청을 보내지 않음)
    pub async fn set_field_properties(
        &mut self,
        table_id: &str,
        fid: u32,
        properties: &[(&str, &str)],
    ) -> Result<()> {
        let mut request =
            Request::for_table("setFieldProperties", table_id).field("fid", &fid.to_string());
        for (name, value) in properties {
            if !is_valid_field_property(name) {
                return Err(QdbError::InvalidFieldProperty {
                    property: (*name).to_string(),
                });
            }
            request = request.field(name, value);
        }
        self.send_request(request).await?;
        self.set_active_field(Some(fid));
        Ok(())
    }

    pub async fn set_key_field(&mut self, table_id: &str, fid: u32) -> Result<()> {
        self.send_request(Request::for_table("setKeyField", table_id).field("fid", &fid.to_string()))
            .await?;
        Ok(())
    }

    /// 선택지를 추가하고 실제로 추가된 수를 돌려줍니다.
    pub async fn field_add_choices(&mut self, table_id: &str, fid: u32, choices: &[&str]) -> Result<u32> {
        let resp = self
            .send_request(choice_request("fieldAddChoices", table_id, fid, choices))
            .await?;
        parse_value(&resp, "numadded")
    }

    /// 선택지를 제거하고 실제로 제거된 수를 돌려줍니다.
    pub async fn field_remove_choices(
        &mut self,
        table_id: &str,
        fid: u32,
        choices: &[&str],
    ) -> Result<u32> {
        let resp = self
            .send_request(choice_request("fieldRemoveChoices", table_id, fid, choices))
            .await?;
        parse_value(&resp, "numremoved")
    }

    /// 애플리케이션 변수 값. 값이 비어 있으면 `None`.
    pub async fn get_db_var(&mut self, table_id: &str, name: &str) -> Result<Option<String>> {
        let resp = self
            .send_request(Request::for_table("getDBvar", table_id).field("varname", name))
            .await?;
        Ok(resp.value("value").map(str::to_string))
    }

    pub async fn set_db_var(&mut self, table_id: &str, name: &str, value: &str) -> Result<()> {
        let request = Request::for_table("setDBvar", table_id)
            .field("varname", name)
            .field("value", value);
        self.send_request(request).await?;
        Ok(())
    }

    /// 새 애플리케이션을 만들고 활성 테이블로 설정합니다.
    pub async fn create_database(
        &mut self,
        name: &str,
        description: &str,
        create_app_token: bool,
    ) -> Result<CreatedDatabase> {
        let request = Request::new("createDatabase")
            .field("dbname", name)
            .field("dbdesc", description)
            .field("createapptoken", if create_app_token { "1" } else { "0" });
        let resp = self.send_request(request).await?;
        let dbid = resp
            .value("dbid")
            .ok_or_else(|| QdbError::MalformedResponse("dbid".to_string()))?
            .to_string();
        self.set_active_table(Some(&dbid));
        Ok(CreatedDatabase {
            dbid,
            app_dbid: text_value(&resp, "appdbid"),
            app_token: resp.value("apptoken").map(str::to_string),
        })
    }

    /// 애플리케이션에 테이블을 만들고 새 테이블 ID를 돌려줍니다.
    pub async fn create_table(
        &mut self,
        app_dbid: &str,
        table_name: &str,
        record_noun: &str,
    ) -> Result<String> {
        let request = Request::for_table("createTable", app_dbid)
            .field("tname", table_name)
            .field("pnoun", record_noun);
        let resp = self.send_request(request).await?;
        let table_id = resp
            .value("newdbid")
            .or_else(|| resp.value("newDBID"))
            .ok_or_else(|| QdbError::MalformedResponse("newdbid".to_string()))?
            .to_string();
        self.set_active_table(Some(&table_id));
        Ok(table_id)
    }

    pub async fn delete_database(&mut self, table_id: &str) -> Result<()> {
        self.send_request(Request::for_table("deleteDatabase", table_id))
            .await?;
        self.set_active_table(None);
        Ok(())
    }

    /// 접근 가능한 애플리케이션/테이블 목록
    pub async fn granted_dbs(&mut self, options: GrantedDbsOptions) -> Result<Vec<GrantedDb>> {
        let request = Request::new("grantedDBs")
            .flag("withembeddedtables", options.with_embedded_tables)
            .flag("Excludeparents", options.exclude_parents)
            .flag("adminOnly", options.admin_only)
            .flag("includeancestors", options.include_ancestors);
        let resp = self.send_request(request).await?;
        Ok(resp
            .elements("databases/dbinfo")
            .into_iter()
            .map(|db| GrantedDb {
                name: db.child_text("dbname").unwrap_or_default().to_string(),
                dbid: db.child_text("dbid").unwrap_or_default().to_string(),
            })
            .collect())
    }

    /// 사용자 정보. `email`이 없으면 현재 인증된 사용자.
    pub async fn get_user_info(&mut self, email: Option<&str>) -> Result<UserInfo> {
        let request = Request::new("getUserInfo").field_opt("email", email.filter(|e| !e.is_empty()));
        let resp = self.send_request(request).await?;
        let user = resp
            .element("user")
            .ok_or_else(|| QdbError::MalformedResponse("user".to_string()))?;
        let text = |name: &str| user.child_text(name).unwrap_or_default().to_string();
        Ok(UserInfo {
            id: user.attr("id").unwrap_or_default().to_string(),
            first_name: text("firstName"),
            last_name: text("lastName"),
            login: text("login"),
            email: text("email"),
            screen_name: text("screenName"),
        })
    }

    /// CSV 데이터를 가져옵니다.
    ///
    /// `clist`가 없으면 첫 줄을 필드 이름 헤더로 보고 스키마에서 field id를 찾아
    /// 열 목록을 만들고, 헤더 줄은 서버가 건너뛰게 합니다.
    ///
    /// # 에러
    ///
    /// - [`QdbError::UnknownField`]: 헤더의 필드 이름을 스키마에서 찾을 수 없음
    pub async fn import_from_csv(
        &mut self,
        table_id: &str,
        csv: &str,
        clist: Option<&str>,
    ) -> Result<ImportResult> {
        let (clist, skip_first) = match clist {
            Some(clist) => (clist.to_string(), false),
            None => {
                let header = csv.lines().next().unwrap_or_default();
                let schema = self.get_schema(table_id).await?;
                let mut ids = Vec::new();
                for name in split_separated(header, ',') {
                    let fid = schema.resolve_field_id(&name).ok_or_else(|| QdbError::UnknownField {
                        table_id: table_id.to_string(),
                        name: name.clone(),
                    })?;
                    ids.push(fid.to_string());
                }
                (ids.join("."), true)
            }
        };

        let request = Request::for_table("importFromCSV", table_id)
            .raw(&format!("<records_csv><![CDATA[{csv}]]></records_csv>"))
            .field("clist", &clist)
            .flag("skipfirst", skip_first);
        let resp = self.send_request(request).await?;
        Ok(ImportResult {
            input: parse_value(&resp, "num_recs_input").unwrap_or(0),
            added: parse_value(&resp, "num_recs_added").unwrap_or(0),
            updated: parse_value(&resp, "num_recs_updated").unwrap_or(0),
            rids: resp
                .elements("rids/rid")
                .into_iter()
                .filter_map(|r| r.text()?.trim().parse().ok())
                .collect(),
        })
    }

    /// 레코드를 HTML로 렌더링한 원본 본문
    pub async fn get_record_as_html(&mut self, table_id: &str, rid: u64) -> Result<String> {
        let resp = self
            .send_request(Request::for_table("getRecordAsHTML", table_id).field("rid", &rid.to_string()))
            .await?;
        Ok(resp.raw().to_string())
    }

    /// 서버 상태 (버전, 가동 시간 등)
    pub async fn ob_status(&mut self) -> Result<ServerStatus> {
        let resp = self.send_request(Request::new("obStatus")).await?;
        let values = resp
            .root()
            .children
            .iter()
            .filter(|c| !matches!(c.name.as_str(), "action" | "errcode" | "errtext" | "errdetail"))
            .map(|c| (c.name.clone(), c.text_or_empty().to_string()))
            .collect();
        Ok(ServerStatus { values })
    }
}

fn choice_request(operation: &str, table_id: &str, fid: u32, choices: &[&str]) -> Request {
    choices.iter().fold(
        Request::for_table(operation, table_id).field("fid", &fid.to_string()),
        |request, choice| request.field("choice", choice),
    )
}
