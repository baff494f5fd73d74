//! QuickBase 스타일 API에서 사용하는 경로, 접두사, 기본값 상수 등을 정의합니다.

/// HTTP 클라이언트 User-Agent 문자열
pub const USER_AGENT: &str = concat!("qdbapi-rs/", env!("CARGO_PKG_VERSION"));

/// 요청 envelope의 루트 엘리먼트 이름
pub const REQUEST_ROOT: &str = "qdbapi";

/// 오퍼레이션 이름 정규화 접두사
pub const API_PREFIX: &str = "API_";

/// 정규화를 건너뛰는 두 번째 접두사
pub const QBIS_PREFIX: &str = "QBIS_";

/// 관리용 고정 엔드포인트 경로
pub const ADMIN_PATH: &str = "/db/main";

/// 요청 본문의 Content-Type
pub const CONTENT_TYPE: &str = "application/xml";

/// 정규화된 오퍼레이션 이름을 실어 보내는 HTTP 헤더
pub const ACTION_HEADER: &str = "QUICKBASE-ACTION";

/// "모든 레코드" 조건 (항상 참인 criteria)
pub const DEFAULT_CRITERIA: &str = "{'0'.CT.''}";

/// 이 값 미만의 field id는 서버 예약(built-in) 필드
pub const BUILT_IN_FIELD_LIMIT: u32 = 6;

/// 레코드 ID 필드의 고정 field id
pub const RECORD_ID_FID: &str = "3";

/// 모든 조회 요청에 사용하는 응답 형식
pub const STRUCTURED_FMT: &str = "structured";

/// 성공을 뜻하는 에러 코드
pub const SUCCESS_CODE: &str = "0";

/// 기본 realm (서브도메인)
pub const DEFAULT_REALM: &str = "www";

/// 기본 도메인
pub const DEFAULT_DOMAIN: &str = "quickbase";

/// 테이블과 무관하게 [`ADMIN_PATH`]로 보내는 오퍼레이션 (정규화 이전 이름)
pub const ADMIN_OPERATIONS: &[&str] = &[
    "authenticate",
    "createDatabase",
    "deleteAppZip",
    "dumpAppZip",
    "getUserInfo",
    "findDBByName",
    "getOneTimeTicket",
    "getFileUploadToken",
    "grantedDBs",
    "installAppZip",
    "obStatus",
    "signOut",
];

/// 인증 블록 없이 보낼 수 있는 오퍼레이션
pub const UNAUTHENTICATED_OPERATIONS: &[&str] = &["authenticate", "obStatus"];

/// XML 대신 HTML을 반환하는 오퍼레이션 (응답 파싱 생략)
pub const HTML_OPERATIONS: &[&str] = &["genAddRecordForm", "genResultsTable", "getRecordAsHTML"];

/// 테이블 ID를 쿼리 스트링으로 받는 오퍼레이션
pub const APP_DTM_OPERATION: &str = "getAppDTMInfo";

/// `addField`가 허용하는 필드 타입
pub const VALID_FIELD_TYPES: &[&str] = &[
    "checkbox",
    "dblink",
    "date",
    "duration",
    "email",
    "file",
    "fkey",
    "float",
    "formula",
    "currency",
    "lookup",
    "multiuserid",
    "phone",
    "percent",
    "rating",
    "recordid",
    "text",
    "timeofday",
    "timestamp",
    "url",
    "userid",
    "icalendarbutton",
];

/// `setFieldProperties`가 허용하는 속성 이름
pub const VALID_FIELD_PROPERTIES: &[&str] = &[
    "allow_new_choices",
    "allowHTML",
    "appears_by_default",
    "append_only",
    "blank_is_zero",
    "bold",
    "carrychoices",
    "comma_start",
    "cover_text",
    "currency_format",
    "currency_symbol",
    "decimal_places",
    "default_kind",
    "default_today",
    "default_value",
    "display_dow",
    "display_graphic",
    "display_month",
    "display_relative",
    "display_time",
    "display_today",
    "display_user",
    "display_zone",
    "does_average",
    "does_total",
    "doesdatacopy",
    "exact",
    "fieldhelp",
    "find_enabled",
    "foreignkey",
    "format",
    "formula",
    "has_extension",
    "hours24",
    "label",
    "max_versions",
    "maxlength",
    "nowrap",
    "num_lines",
    "required",
    "sort_as_given",
    "source_fid",
    "source_fieldname",
    "target_dbid",
    "target_dbname",
    "target_fid",
    "target_fieldname",
    "unique",
    "units",
    "use_new_window",
    "width",
];

/// UI 표시용 필드 타입 라벨 → 프로토콜 필드 타입
pub const FIELD_TYPE_LABELS: &[(&str, &str)] = &[
    ("Text", "text"),
    ("Numeric", "float"),
    ("Date / Time", "timestamp"),
    ("Date", "date"),
    ("Checkbox", "checkbox"),
    ("Database Link", "dblink"),
    ("Duration", "duration"),
    ("Email", "email"),
    ("File Attachment", "file"),
    ("Numeric-Currency", "currency"),
    ("Numeric-Rating", "rating"),
    ("Numeric-Percent", "percent"),
    ("Phone Number", "phone"),
    ("Relationship", "fkey"),
    ("Time Of Day", "timeofday"),
    ("URL", "url"),
    ("User", "user"),
    ("Record ID#", "recordid"),
    ("Report Link", "dblink"),
    ("iCalendar", "icalendarbutton"),
];

/// 필드 타입 라벨을 프로토콜 필드 타입 문자열로 변환합니다.
///
/// # 예시
///
/// ```
/// use qdbapi::constants::field_type_for_label;
///
/// assert_eq!(field_type_for_label("Numeric-Currency"), Some("currency"));
/// assert_eq!(field_type_for_label("Spreadsheet"), None);
/// ```
pub fn field_type_for_label(label: &str) -> Option<&'static str> {
    FIELD_TYPE_LABELS
        .iter()
        .find(|(l, _)| *l == label)
        .map(|(_, t)| *t)
}

/// 필드 타입 문자열이 `addField`에서 허용되는지 확인합니다.
pub fn is_valid_field_type(field_type: &str) -> bool {
    VALID_FIELD_TYPES.contains(&field_type)
}

/// 필드 속성 이름이 `setFieldProperties`에서 허용되는지 확인합니다.
pub fn is_valid_field_property(property: &str) -> bool {
    VALID_FIELD_PROPERTIES.contains(&property)
}
