//! 프로토콜 코덱 모듈: 요청 envelope 빌더 + 응답 파서
//!
//! ## 요청 빌더
//!
//! - [`Request`]: 오퍼레이션 이름, 대상 테이블, 페이로드 엘리먼트
//! - [`Request::build`]: 세션 인증 정보를 붙여 [`Envelope`] (경로, 액션, 본문) 생성
//! - [`normalize_operation`]: `API_` 접두사 정규화
//! - [`endpoint_path`]: 오퍼레이션별 대상 경로 결정
//!
//! ## 응답 파서
//!
//! - [`Response::parse`]: 본문 정규화 + 트리 파싱 + 에러 정보 추출
//! - [`Response::value`]: 최상위 값 (없으면 `None`)
//! - [`Response::path_value`]: 경로 값 (없으면 `""`)
//! - [`Response::path_values`]: 경로에 해당하는 모든 텍스트를 이어 붙임

use crate::constants::{
    ADMIN_OPERATIONS, ADMIN_PATH, API_PREFIX, APP_DTM_OPERATION, HTML_OPERATIONS, QBIS_PREFIX,
    REQUEST_ROOT, SUCCESS_CODE, UNAUTHENTICATED_OPERATIONS,
};
use crate::encoding::encode_xml;
use crate::error::{QdbError, Result};
use crate::xml::{parse, Element, ParseOptions};

/// 요청마다 붙는 세션 단위 값 (인증 + 에코 지시자)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionParams {
    /// 세션 티켓. 있으면 사용자명/비밀번호보다 우선합니다.
    pub ticket: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub app_token: Option<String>,
    /// 이전 응답에서 돌려받은 불투명 토큰
    pub udata: Option<String>,
    pub rdr: Option<String>,
    pub xsl: Option<String>,
    pub encoding: Option<String>,
}

impl SessionParams {
    /// 티켓 또는 사용자명+비밀번호가 있는지
    pub fn has_auth(&self) -> bool {
        self.ticket.is_some() || (self.username.is_some() && self.password.is_some())
    }

    /// 로그아웃: 인증 정보만 지웁니다.
    pub fn clear_auth(&mut self) {
        self.ticket = None;
        self.username = None;
        self.password = None;
    }
}

/// 단일 `<tag>value</tag>` 또는 `<tag/>` 조각을 만듭니다. 값은 이미 인코딩된 것으로 봅니다.
pub fn to_xml(tag: &str, value: Option<&str>) -> String {
    match value {
        Some(v) if !v.is_empty() => format!("<{tag}>{v}</{tag}>"),
        _ => format!("<{tag}/>"),
    }
}

/// 오퍼레이션 이름에 `API_` 접두사를 붙입니다.
///
/// 이미 `API_` 또는 `QBIS_`를 포함하면 그대로 둡니다.
///
/// # 예시
///
/// ```
/// use qdbapi::codec::normalize_operation;
///
/// assert_eq!(normalize_operation("doQuery"), "API_doQuery");
/// assert_eq!(normalize_operation("API_DoQuery"), "API_DoQuery");
/// assert_eq!(normalize_operation("QBIS_Custom"), "QBIS_Custom");
/// ```
pub fn normalize_operation(operation: &str) -> String {
    if operation.contains(API_PREFIX) || operation.contains(QBIS_PREFIX) {
        operation.to_string()
    } else {
        format!("{API_PREFIX}{operation}")
    }
}

/// 접두사를 뗀 오퍼레이션 이름 (상수 표와 비교용)
fn base_operation(operation: &str) -> &str {
    operation.strip_prefix(API_PREFIX).unwrap_or(operation)
}

fn is_listed(list: &[&str], operation: &str) -> bool {
    let base = base_operation(operation);
    list.iter().any(|op| op.eq_ignore_ascii_case(base))
}

/// 오퍼레이션의 대상 경로를 결정합니다.
///
/// - 관리 오퍼레이션 → `/db/main`
/// - `getAppDTMInfo` → `/db/main?a=getAppDTMInfo&dbid={table}`
/// - 그 외 → `/db/{table}`
///
/// # 에러
///
/// - [`QdbError::NoActiveTable`]: 테이블 주소 지정 오퍼레이션인데 테이블 ID가 없음
pub fn endpoint_path(operation: &str, table_id: Option<&str>) -> Result<String> {
    if is_listed(ADMIN_OPERATIONS, operation) {
        return Ok(ADMIN_PATH.to_string());
    }
    let table = table_id
        .filter(|t| !t.is_empty())
        .ok_or_else(|| QdbError::NoActiveTable {
            operation: normalize_operation(operation),
        })?;
    if is_listed(&[APP_DTM_OPERATION], operation) {
        return Ok(format!(
            "{ADMIN_PATH}?a={APP_DTM_OPERATION}&dbid={}",
            urlencoding::encode(table)
        ));
    }
    Ok(format!("/db/{}", urlencoding::encode(table)))
}

/// 응답이 XML이 아닌 HTML인 오퍼레이션인지
pub fn returns_html(operation: &str) -> bool {
    is_listed(HTML_OPERATIONS, operation)
}

/// 단일 프로토콜 요청
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    operation: String,
    table_id: Option<String>,
    payload: String,
}

/// 전송 직전의 요청: 대상 경로, 정규화된 액션 이름, XML 본문
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub path: String,
    pub action: String,
    pub body: String,
    /// 응답을 XML로 파싱하지 않음
    pub html: bool,
}

impl Request {
    /// 테이블과 무관한 요청
    pub fn new(operation: &str) -> Self {
        Self {
            operation: operation.to_string(),
            table_id: None,
            payload: String::new(),
        }
    }

    /// 테이블 주소 지정 요청
    pub fn for_table(operation: &str, table_id: &str) -> Self {
        Self {
            table_id: Some(table_id.to_string()),
            ..Self::new(operation)
        }
    }

    /// 값을 XML 인코딩하여 `<tag>value</tag>`를 추가합니다.
    pub fn field(mut self, tag: &str, value: &str) -> Self {
        self.payload.push_str(&to_xml(tag, Some(&encode_xml(value))));
        self
    }

    /// 값이 있을 때만 [`field`](Self::field)를 적용합니다.
    pub fn field_opt(self, tag: &str, value: Option<&str>) -> Self {
        match value {
            Some(v) => self.field(tag, v),
            None => self,
        }
    }

    /// 플래그가 참이면 `<tag>1</tag>`를 추가합니다.
    pub fn flag(self, tag: &str, on: bool) -> Self {
        if on { self.field(tag, "1") } else { self }
    }

    /// 이미 완성된 XML 조각을 그대로 추가합니다.
    pub fn raw(mut self, fragment: &str) -> Self {
        self.payload.push_str(fragment);
        self
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn table_id(&self) -> Option<&str> {
        self.table_id.as_deref()
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// 세션 값과 결합해 envelope을 만듭니다.
    ///
    /// 본문 순서: 에코 지시자(`udata`, `rdr`, `xsl`, `encoding`) → 인증 블록 → 페이로드
    ///
    /// # 에러
    ///
    /// - [`QdbError::NotAuthenticated`]: 인증이 필요한 오퍼레이션인데 티켓/자격 증명이 없음
    /// - [`QdbError::NoActiveTable`]: 테이블 ID 누락
    pub fn build(&self, session: &SessionParams) -> Result<Envelope> {
        let action = normalize_operation(&self.operation);
        let path = endpoint_path(&self.operation, self.table_id.as_deref())?;

        let mut body = format!("<{REQUEST_ROOT}>");
        for (tag, value) in [
            ("udata", &session.udata),
            ("rdr", &session.rdr),
            ("xsl", &session.xsl),
            ("encoding", &session.encoding),
        ] {
            if let Some(v) = value {
                body.push_str(&to_xml(tag, Some(&encode_xml(v))));
            }
        }

        // NOTE: authenticate carries its own credentials in the payload
        if !base_operation(&self.operation).eq_ignore_ascii_case("authenticate") {
            if let Some(ticket) = &session.ticket {
                body.push_str(&to_xml("ticket", Some(&encode_xml(ticket))));
            } else if let (Some(user), Some(pass)) = (&session.username, &session.password) {
                body.push_str(&to_xml("username", Some(&encode_xml(user))));
                body.push_str(&to_xml("password", Some(&encode_xml(pass))));
            } else if !is_listed(UNAUTHENTICATED_OPERATIONS, &self.operation) {
                return Err(QdbError::NotAuthenticated { operation: action });
            }
        }
        if let Some(token) = &session.app_token {
            body.push_str(&to_xml("apptoken", Some(&encode_xml(token))));
        }

        body.push_str(&self.payload);
        body.push_str(&format!("</{REQUEST_ROOT}>"));

        Ok(Envelope {
            path,
            action,
            body,
            html: returns_html(&self.operation),
        })
    }
}

/// 응답의 에러 정보 (`errcode`, `errtext`, `errdetail`)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorInfo {
    pub code: String,
    pub text: String,
    pub detail: String,
}

impl ErrorInfo {
    /// HTML 응답처럼 에러 엘리먼트가 없는 성공 응답
    pub fn success() -> Self {
        Self {
            code: SUCCESS_CODE.to_string(),
            ..Self::default()
        }
    }

    /// 응답 루트에서 에러 정보를 추출합니다. 엘리먼트가 없으면 빈 문자열.
    pub fn from_root(root: &Element) -> Self {
        let get = |name: &str| root.child_text(name).unwrap_or_default().to_string();
        Self {
            code: get("errcode"),
            text: get("errtext"),
            detail: get("errdetail"),
        }
    }

    /// 에러 코드가 `"0"`이면 성공
    pub fn is_success(&self) -> bool {
        self.code == SUCCESS_CODE
    }

    /// `Error code: {code} text: {text}: detail: {detail}` 형태의 합성 문자열
    pub fn composed(&self) -> String {
        format!(
            "Error code: {} text: {}: detail: {}",
            self.code, self.text, self.detail
        )
    }

    /// 실패 응답이면 [`QdbError::Protocol`]로 변환합니다.
    pub fn to_error(&self) -> Option<QdbError> {
        if self.is_success() {
            return None;
        }
        Some(QdbError::Protocol {
            code: self.code.clone(),
            text: self.text.clone(),
            detail: self.detail.clone(),
        })
    }
}

/// 파싱된 응답 문서
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    root: Element,
    error: ErrorInfo,
    raw: String,
}

impl Response {
    /// 응답 본문을 정규화 후 파싱합니다.
    ///
    /// # 에러
    ///
    /// - [`QdbError::Xml`]: 올바른 XML이 아님
    ///
    /// # 예시
    ///
    /// ```
    /// use qdbapi::codec::Response;
    /// use qdbapi::xml::ParseOptions;
    ///
    /// let body = "<qdbapi><errcode>0</errcode><errtext>No error</errtext><dbid>bdb5rjd6h</dbid></qdbapi>";
    /// let resp = Response::parse(body, &ParseOptions::default()).unwrap();
    /// assert!(resp.error_info().is_success());
    /// assert_eq!(resp.value("dbid"), Some("bdb5rjd6h"));
    /// assert_eq!(resp.value("missing"), None);
    /// assert_eq!(resp.path_value("missing"), "");
    /// ```
    pub fn parse(body: &str, options: &ParseOptions) -> Result<Self> {
        let root = parse(body, options)?;
        let error = ErrorInfo::from_root(&root);
        Ok(Self {
            root,
            error,
            raw: body.to_string(),
        })
    }

    /// 파싱하지 않는 HTML 응답
    pub fn html(body: &str) -> Self {
        Self {
            root: Element::new("html"),
            error: ErrorInfo::success(),
            raw: body.to_string(),
        }
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    pub fn error_info(&self) -> &ErrorInfo {
        &self.error
    }

    /// 원본 응답 본문
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// 최상위 자식 엘리먼트의 텍스트. 엘리먼트가 없거나 텍스트가 없으면 `None`.
    pub fn value(&self, name: &str) -> Option<&str> {
        self.root.child_text(name)
    }

    /// 경로 값. 없으면 빈 문자열.
    pub fn path_value(&self, path: &str) -> String {
        self.root
            .select_first(path)
            .map(|e| e.text_or_empty().to_string())
            .unwrap_or_default()
    }

    /// 경로에 해당하는 모든 엘리먼트의 텍스트를 이어 붙입니다.
    pub fn path_values(&self, path: &str) -> String {
        self.root
            .select(path)
            .iter()
            .map(|e| e.text_or_empty())
            .collect()
    }

    pub fn element(&self, path: &str) -> Option<&Element> {
        self.root.select_first(path)
    }

    pub fn elements(&self, path: &str) -> Vec<&Element> {
        self.root.select(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ticket_session() -> SessionParams {
        SessionParams {
            ticket: Some("T1".to_string()),
            app_token: Some("tok".to_string()),
            ..SessionParams::default()
        }
    }

    #[test]
    fn test_to_xml() {
        assert_eq!(to_xml("fmt", Some("structured")), "<fmt>structured</fmt>");
        assert_eq!(to_xml("includeRids", None), "<includeRids/>");
        assert_eq!(to_xml("x", Some("")), "<x/>");
    }

    #[test]
    fn test_endpoint_path() {
        assert_eq!(endpoint_path("authenticate", None).unwrap(), "/db/main");
        assert_eq!(endpoint_path("API_GrantedDBs", None).unwrap(), "/db/main");
        assert_eq!(
            endpoint_path("doQuery", Some("bdb5rjd6h")).unwrap(),
            "/db/bdb5rjd6h"
        );
        assert_eq!(
            endpoint_path("getAppDTMInfo", Some("bdb5rjd6h")).unwrap(),
            "/db/main?a=getAppDTMInfo&dbid=bdb5rjd6h"
        );
        assert!(matches!(
            endpoint_path("doQuery", None),
            Err(QdbError::NoActiveTable { .. })
        ));
    }

    #[test]
    fn test_build_with_ticket_and_token() {
        let env = Request::for_table("getSchema", "bdb5rjd6h")
            .build(&ticket_session())
            .unwrap();
        assert_eq!(env.path, "/db/bdb5rjd6h");
        assert_eq!(env.action, "API_getSchema");
        assert_eq!(
            env.body,
            "<qdbapi><ticket>T1</ticket><apptoken>tok</apptoken></qdbapi>"
        );
        assert!(!env.html);
    }

    #[test]
    fn test_ticket_takes_precedence_over_credentials() {
        let mut session = ticket_session();
        session.username = Some("u".to_string());
        session.password = Some("p".to_string());
        let env = Request::for_table("getSchema", "abc").build(&session).unwrap();
        assert!(env.body.contains("<ticket>T1</ticket>"));
        assert!(!env.body.contains("<username>"));
    }

    #[test]
    fn test_credentials_when_no_ticket() {
        let session = SessionParams {
            username: Some("me@x.com".to_string()),
            password: Some("a<b".to_string()),
            ..SessionParams::default()
        };
        let env = Request::for_table("getSchema", "abc").build(&session).unwrap();
        assert_eq!(
            env.body,
            "<qdbapi><username>me@x.com</username><password>a&lt;b</password></qdbapi>"
        );
    }

    #[test]
    fn test_missing_auth_is_contract_violation() {
        let err = Request::for_table("doQuery", "abc")
            .build(&SessionParams::default())
            .unwrap_err();
        assert!(matches!(err, QdbError::NotAuthenticated { .. }));
    }

    #[test]
    fn test_authenticate_payload_carries_credentials() {
        let env = Request::new("authenticate")
            .field("username", "u")
            .field("password", "p")
            .build(&SessionParams::default())
            .unwrap();
        assert_eq!(
            env.body,
            "<qdbapi><username>u</username><password>p</password></qdbapi>"
        );
        assert_eq!(env.path, "/db/main");
    }

    #[test]
    fn test_echo_fields_come_first() {
        let mut session = ticket_session();
        session.udata = Some("u1".to_string());
        session.encoding = Some("UTF-8".to_string());
        let env = Request::for_table("doQuery", "abc")
            .field("query", "{'0'.CT.''}")
            .build(&session)
            .unwrap();
        assert_eq!(
            env.body,
            "<qdbapi><udata>u1</udata><encoding>UTF-8</encoding><ticket>T1</ticket>\
             <apptoken>tok</apptoken><query>{&apos;0&apos;.CT.&apos;&apos;}</query></qdbapi>"
        );
    }

    #[test]
    fn test_html_operations() {
        let env = Request::for_table("getRecordAsHTML", "abc")
            .build(&ticket_session())
            .unwrap();
        assert!(env.html);
        assert!(returns_html("API_GenResultsTable"));
        assert!(!returns_html("doQuery"));
    }

    #[test]
    fn test_request_helpers() {
        let req = Request::for_table("doQuery", "abc")
            .field_opt("clist", Some("6.7"))
            .field_opt("slist", None)
            .flag("includeRids", true)
            .flag("returnPercentage", false)
            .raw("<fmt>structured</fmt>");
        assert_eq!(
            req.payload(),
            "<clist>6.7</clist><includeRids>1</includeRids><fmt>structured</fmt>"
        );
        assert_eq!(req.table_id(), Some("abc"));
    }

    #[test]
    fn test_error_info() {
        let body = "<qdbapi><errcode>4</errcode><errtext>User not authorized</errtext>\
                    <errdetail>no access</errdetail></qdbapi>";
        let resp = Response::parse(body, &ParseOptions::default()).unwrap();
        let info = resp.error_info();
        assert!(!info.is_success());
        assert_eq!(
            info.composed(),
            "Error code: 4 text: User not authorized: detail: no access"
        );
        let err = info.to_error().unwrap();
        assert_eq!(err.to_string(), info.composed());
    }

    #[test]
    fn test_missing_errcode_is_failure() {
        let resp = Response::parse("<qdbapi/>", &ParseOptions::default()).unwrap();
        assert!(!resp.error_info().is_success());
    }

    #[test]
    fn test_path_value_asymmetry() {
        let body = "<qdbapi><errcode>0</errcode><empty/><table><original><key_fid>3</key_fid></original></table></qdbapi>";
        let resp = Response::parse(body, &ParseOptions::default()).unwrap();
        assert_eq!(resp.value("empty"), None);
        assert_eq!(resp.path_value("empty"), "");
        assert_eq!(resp.path_value("table/original/key_fid"), "3");
        assert_eq!(resp.path_value("table.original.key_fid"), "3");
        assert_eq!(resp.path_value("table/original/nothing"), "");
    }

    #[test]
    fn test_path_values_concatenates() {
        let body = "<qdbapi><rids><rid>1</rid><rid>2</rid><rid>3</rid></rids></qdbapi>";
        let resp = Response::parse(body, &ParseOptions::default()).unwrap();
        assert_eq!(resp.path_values("rids/rid"), "123");
        assert_eq!(resp.elements("rids/rid").len(), 3);
    }

    #[test]
    fn test_html_response() {
        let resp = Response::html("<html><b>x</b></html>");
        assert!(resp.error_info().is_success());
        assert_eq!(resp.raw(), "<html><b>x</b></html>");
    }
}
