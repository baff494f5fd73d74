//! 클라이언트 설정: TOML 파일 또는 문자열에서 로드합니다.
//!
//! ```toml
//! realm = "acme"
//! app_token = "b2fr9wqdk3vm7tq5y8zi3d"
//! username = "me@example.com"
//! password = "secret"
//! stop_on_error = true
//! cache_schemas = true
//!
//! [parse]
//! ignore_lf = false
//! ```

use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

use crate::constants::{DEFAULT_DOMAIN, DEFAULT_REALM};
use crate::error::{QdbError, Result};
use crate::xml::ParseOptions;

/// 클라이언트 설정
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// 서브도메인 (`{realm}.{domain}.com`)
    pub realm: String,
    pub domain: String,
    /// `https://...:443` 사용 여부
    pub use_ssl: bool,
    pub app_token: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub ticket: Option<String>,
    /// 첫 실패 이후 모든 호출을 `Stopped` 에러로 막음
    pub stop_on_error: bool,
    /// 테이블별 스키마 캐시 사용
    pub cache_schemas: bool,
    pub parse: ParseOptions,
    pub udata: Option<String>,
    pub rdr: Option<String>,
    pub xsl: Option<String>,
    pub encoding: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            realm: DEFAULT_REALM.to_string(),
            domain: DEFAULT_DOMAIN.to_string(),
            use_ssl: true,
            app_token: None,
            username: None,
            password: None,
            ticket: None,
            stop_on_error: false,
            cache_schemas: false,
            parse: ParseOptions::default(),
            udata: None,
            rdr: None,
            xsl: None,
            encoding: None,
        }
    }
}

impl ClientConfig {
    /// 파일에서 설정을 읽습니다.
    ///
    /// # 에러
    ///
    /// - [`QdbError::ConfigIo`]: 파일 읽기 실패
    /// - [`QdbError::ConfigParse`]: TOML 문법 오류
    /// - [`QdbError::ConfigInvalid`]: 검증 실패
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| QdbError::ConfigIo {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_str(&contents)
    }

    /// 서버 기본 URL
    ///
    /// # 예시
    ///
    /// ```
    /// use qdbapi::config::ClientConfig;
    ///
    /// let config: ClientConfig = "realm = \"acme\"".parse().unwrap();
    /// assert_eq!(config.base_url(), "https://acme.quickbase.com:443");
    /// ```
    pub fn base_url(&self) -> String {
        if self.use_ssl {
            format!("https://{}.{}.com:443", self.realm, self.domain)
        } else {
            format!("http://{}.{}.com", self.realm, self.domain)
        }
    }

    /// 설정 값을 검증합니다.
    pub fn validate(&self) -> Result<()> {
        if self.username.is_some() != self.password.is_some() {
            return Err(QdbError::ConfigInvalid(
                "username and password must be given together".to_string(),
            ));
        }
        if self.realm.trim().is_empty() || self.domain.trim().is_empty() {
            return Err(QdbError::ConfigInvalid(
                "realm and domain must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl FromStr for ClientConfig {
    type Err = QdbError;

    fn from_str(s: &str) -> Result<Self> {
        let config: ClientConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }
}
