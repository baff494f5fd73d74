//! 클라이언트 전반의 에러 타입 계층 구조를 정의합니다.
//!
//! 모든 에러는 [`QdbError`] enum으로 표현되며, [`thiserror`]를 통해
//! `Display` 및 `Error` 트레이트가 자동 구현됩니다.
//!
//! ## 분류
//!
//! - 전송 실패: [`Transport`](QdbError::Transport), [`HttpStatus`](QdbError::HttpStatus), `Http`
//! - 프로토콜 에러: [`Protocol`](QdbError::Protocol) (응답의 errcode가 `"0"`이 아님)
//! - 호출 계약 위반: 네트워크 호출 전에 즉시 반환
//!   ([`InvalidFieldType`](QdbError::InvalidFieldType), [`InvalidFieldProperty`](QdbError::InvalidFieldProperty),
//!   [`InvalidArgument`](QdbError::InvalidArgument), [`NotAuthenticated`](QdbError::NotAuthenticated), ...)
//! - 중단 모드: [`Stopped`](QdbError::Stopped)

/// 클라이언트의 최상위 에러 타입
///
/// 찾을 수 없는 필드/레코드 같은 조회 실패는 에러가 아니라 `Option`/빈 컬렉션으로 표현합니다.
#[derive(Debug, thiserror::Error)]
pub enum QdbError {
    /// 표준 I/O 에러 래핑
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// 응답 본문이 올바른 XML이 아님
    #[error("invalid XML response: {0}")]
    Xml(#[from] roxmltree::Error),

    /// JSON 직렬화 실패
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// 티켓도 사용자명/비밀번호도 없는 상태에서 인증이 필요한 요청 시도
    #[error("not authenticated: {operation} requires a ticket or username and password")]
    NotAuthenticated { operation: String },

    /// 테이블 주소 지정 요청인데 활성 테이블 ID가 없음
    #[error("no active table: {operation} needs a table id")]
    NoActiveTable { operation: String },

    /// `addField`에 허용되지 않는 필드 타입
    #[error("invalid field type '{field_type}'")]
    InvalidFieldType { field_type: String },

    /// `setFieldProperties`에 허용되지 않는 속성 이름
    #[error("invalid field property '{property}'")]
    InvalidFieldProperty { property: String },

    /// 형식이 잘못된 인자
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// 응답에 필수 엘리먼트가 없음
    #[error("malformed response: missing {0}")]
    MalformedResponse(String),

    /// 스키마에 없는 필드 이름
    #[error("unknown field '{name}' in table {table_id}")]
    UnknownField { table_id: String, name: String },

    /// 서버가 반환한 프로토콜 에러
    #[error("Error code: {code} text: {text}: detail: {detail}")]
    Protocol {
        code: String,
        text: String,
        detail: String,
    },

    /// 전송 계층 실패 (연결, 프로토콜 레벨 예외)
    #[error("Error processing {operation} request: {message}")]
    Transport { operation: String, message: String },

    /// 중단 모드에서 이전 실패 이후의 호출
    #[error("stopped after previous error: {last_error}")]
    Stopped { last_error: String },

    /// SQL 구문 해석 실패
    #[error("SQL syntax error at {position}: {message}")]
    SqlSyntax { position: usize, message: String },

    /// 설정 파일 파싱 실패
    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// 설정 파일 읽기 실패
    #[error("failed to read config {path}: {source}")]
    ConfigIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// 설정 값 검증 실패
    #[error("invalid config: {0}")]
    ConfigInvalid(String),

    /// HTTP 클라이언트 에러 (reqwest 래핑)
    #[cfg(feature = "client")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// 예기치 않은 HTTP 상태 코드
    #[error("unexpected HTTP status: {status}")]
    HttpStatus { status: u16 },
}

impl QdbError {
    /// 세션의 last-error 문자열로 기록되는 형태인지 (전송/프로토콜 실패) 확인합니다.
    pub fn is_request_failure(&self) -> bool {
        match self {
            QdbError::Protocol { .. }
            | QdbError::Transport { .. }
            | QdbError::HttpStatus { .. }
            | QdbError::Xml(_)
            | QdbError::MalformedResponse(_) => true,
            #[cfg(feature = "client")]
            QdbError::Http(_) => true,
            _ => false,
        }
    }
}

/// [`QdbError`]를 사용하는 편의 Result 타입 별칭
pub type Result<T> = std::result::Result<T, QdbError>;
