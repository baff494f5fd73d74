//! 전송 계층: 요청 envelope을 네트워크로 보내고 (상태 코드, 본문)을 돌려받습니다.
//!
//! [`Transport`] 트레이트가 클라이언트와 네트워크 사이의 경계입니다.
//! 기본 구현 [`HttpTransport`]는 reqwest 기반이며 feature `"client"` 활성화 시에만 포함됩니다.
//! 테스트에서는 메모리 내 구현으로 교체합니다.

use std::future::Future;

use crate::error::Result;

/// 전송할 HTTP 요청
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// `/db/{table}` 같은 엔드포인트 경로 (쿼리 스트링 포함 가능)
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// 수신한 HTTP 응답
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// 요청 하나를 보내고 응답을 기다리는 전송 계층
///
/// 연결 설정, TLS, 프록시, 타임아웃은 구현체의 책임입니다.
pub trait Transport {
    fn send(&self, request: &HttpRequest) -> impl Future<Output = Result<HttpResponse>> + Send;
}

#[cfg(feature = "client")]
pub use http::HttpTransport;

#[cfg(feature = "client")]
mod http {
    use reqwest::Client;

    use super::{HttpRequest, HttpResponse, Transport};
    use crate::constants::USER_AGENT;
    use crate::error::Result;

    /// reqwest 기반 HTTPS 전송 계층
    ///
    /// # 예시
    ///
    /// ```no_run
    /// use qdbapi::transport::HttpTransport;
    ///
    /// # fn example() -> qdbapi::Result<()> {
    /// let transport = HttpTransport::new("https://www.quickbase.com:443/")?;
    /// assert_eq!(transport.base_url(), "https://www.quickbase.com:443");
    /// # Ok(())
    /// # }
    /// ```
    #[derive(Debug, Clone)]
    pub struct HttpTransport {
        http: Client,
        base_url: String,
    }

    impl HttpTransport {
        /// 새 전송 계층을 만듭니다. `base_url` 끝의 `/`는 제거됩니다.
        ///
        /// reqwest::Client는 cookie_store를 활성화하고 rustls-tls를 사용합니다.
        pub fn new(base_url: &str) -> Result<Self> {
            let http = Client::builder()
                .cookie_store(true)
                .user_agent(USER_AGENT)
                .build()?;
            Ok(Self {
                http,
                base_url: base_url.trim_end_matches('/').to_string(),
            })
        }

        pub fn base_url(&self) -> &str {
            &self.base_url
        }
    }

    impl Transport for HttpTransport {
        async fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
            let url = format!("{}{}", self.base_url, request.path);
            let mut builder = self.http.post(&url).body(request.body.clone());
            for (name, value) in &request.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }
            let resp = builder.send().await?;
            let status = resp.status().as_u16();
            let body = resp.text().await?;
            Ok(HttpResponse { status, body })
        }
    }

}

/// 단위 테스트용 메모리 내 전송 계층
#[cfg(test)]
pub(crate) mod mock {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::{HttpRequest, HttpResponse, Transport};
    use crate::error::{QdbError, Result};

    /// 준비된 응답을 순서대로 돌려주고, 보낸 요청을 모두 기록합니다.
    #[derive(Debug, Default)]
    pub(crate) struct MockTransport {
        responses: Mutex<VecDeque<Result<HttpResponse>>>,
        requests: Mutex<Vec<HttpRequest>>,
    }

    /// 성공 응답 본문 (`errcode` 0) 안에 `inner`를 넣습니다.
    pub(crate) fn ok_body(inner: &str) -> String {
        format!("<qdbapi><errcode>0</errcode><errtext>No error</errtext>{inner}</qdbapi>")
    }

    impl MockTransport {
        pub(crate) fn push_ok(&self, inner: &str) -> &Self {
            self.push(Ok(HttpResponse::ok(ok_body(inner))))
        }

        pub(crate) fn push_error(&self, code: &str, text: &str) -> &Self {
            let body = format!(
                "<qdbapi><errcode>{code}</errcode><errtext>{text}</errtext><errdetail>detail</errdetail></qdbapi>"
            );
            self.push(Ok(HttpResponse::ok(body)))
        }

        /// 샘플 `Orders` 스키마 응답
        pub(crate) fn push_schema(&self) -> &Self {
            self.push(Ok(HttpResponse::ok(crate::schema::tests::SCHEMA_XML)))
        }

        pub(crate) fn push(&self, response: Result<HttpResponse>) -> &Self {
            self.responses.lock().unwrap().push_back(response);
            self
        }

        pub(crate) fn requests(&self) -> Vec<HttpRequest> {
            self.requests.lock().unwrap().clone()
        }

        pub(crate) fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }

        pub(crate) fn last_body(&self) -> String {
            self.requests
                .lock()
                .unwrap()
                .last()
                .map(|r| r.body.clone())
                .unwrap_or_default()
        }
    }

    impl Transport for MockTransport {
        async fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
            self.requests.lock().unwrap().push(request.clone());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(QdbError::InvalidArgument("no canned response".to_string())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_lookup_case_insensitive() {
        let req = HttpRequest {
            path: "/db/main".to_string(),
            headers: vec![("Content-Type".to_string(), "application/xml".to_string())],
            body: String::new(),
        };
        assert_eq!(req.header("content-type"), Some("application/xml"));
        assert_eq!(req.header("accept"), None);
    }

    #[test]
    fn test_response_status() {
        assert!(HttpResponse::ok("x").is_success());
        assert!(!HttpResponse { status: 502, body: String::new() }.is_success());
    }
}
