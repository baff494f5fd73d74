//! # qdbapi
//!
//! XML-over-HTTPS 테이블형 데이터베이스 서비스 클라이언트 라이브러리.
//!
//! 요청 envelope을 만들어 전송하고, 응답 XML에서 에러 정보와 결과를 추출하며,
//! 그 위에 스키마 캐시, 열 단위 조회, 조인/유니온/그룹 집계, 대량 작업을 제공합니다.
//!
//! ## 모듈 구조
//!
//! - [`constants`]: 오퍼레이션 목록, 내장 field id, 필드 타입/속성 표
//! - [`error`]: 에러 타입 계층 구조 ([`QdbError`])
//! - [`types`]: 공유 타입 ([`FieldType`], [`FieldValue`], [`Selector`], [`Record`], [`FieldValues`])
//! - [`encoding`]: XML 이스케이프, base32 ID, 시간, 구분자 분리
//! - [`xml`]: 응답 XML 트리 ([`Element`](xml::Element))
//! - [`format`]: 필드 타입별 표시 형식 변환
//! - [`codec`]: 요청 envelope 빌더 + 응답 파서
//! - [`transport`]: 전송 계층 트레이트 + reqwest 구현 *(feature `"client"`)*
//! - [`config`]: TOML 설정 ([`ClientConfig`])
//! - [`context`]: 활성 테이블/레코드/필드와 이벤트
//! - [`schema`]: 스키마 모델과 캐시
//! - [`client`]: 세션과 요청 디스패치 ([`Client`])
//! - [`api`]: 서버 오퍼레이션별 typed 래퍼
//! - [`query`]: 열 단위 조회, 순회, 조인, 유니온, 그룹 집계
//! - [`bulk`]: 집계 함수, 중복 제거, 레코드 복사
//! - [`resolve`]: 식별자 문자열 분류와 조회
//! - [`sql`]: SQL `SELECT` 부분집합 번역
//!
//! ## 사용 예시
//!
//! ```rust
//! use qdbapi::encoding::{decode_xml, encode_xml};
//! use qdbapi::schema::is_built_in_field;
//! use qdbapi::Selector;
//!
//! assert_eq!(encode_xml("<a & b>"), "&lt;a &amp; b&gt;");
//! assert_eq!(decode_xml(&encode_xml("Tom's \"café\"")), "Tom's \"café\"");
//! assert!(is_built_in_field(5));
//! assert!(!is_built_in_field(6));
//! assert_eq!(Selector::All.request_field(), ("query", "{'0'.CT.''}"));
//! ```

pub mod api;
pub mod bulk;
pub mod client;
pub mod codec;
pub mod config;
pub mod constants;
pub mod context;
pub mod encoding;
pub mod error;
pub mod format;
pub mod query;
pub mod resolve;
pub mod schema;
pub mod sql;
pub mod transport;
pub mod types;
pub mod xml;

// NOTE: Selective re-export: only expose commonly used types
pub use client::Client;
pub use config::ClientConfig;
pub use context::{ClientEvent, EventHandler};
pub use error::{QdbError, Result};
pub use query::{JoinSpec, QueryOptions, QueryResult, UnionSpec};
pub use schema::{FieldDef, Schema};
pub use types::{
    DuplicatePolicy, FieldFilter, FieldType, FieldValue, FieldValues, Record, Selector,
};
