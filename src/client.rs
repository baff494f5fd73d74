//! 클라이언트 모듈: 세션 관리, 요청 디스패치, 에러 전파
//!
//! [`Client`]는 [`Transport`] 구현체 위에서 동작하며 다음 상태를 인스턴스 단위로 보유합니다.
//!
//! - 인증 (티켓 또는 사용자명/비밀번호) + 애플리케이션 토큰
//! - 활성 컨텍스트 ([`ActiveContext`]) 와 활성 스키마
//! - 스키마 캐시 (옵트인)
//! - 마지막 에러, 성공 플래그, 마지막 요청/응답
//!
//! 모든 오퍼레이션은 `&mut self`를 받으므로 한 인스턴스에서 동시에 두 요청이 진행될 수 없습니다.
//!
//! ## 요청 흐름
//!
//! 1. 중단 모드에서 이전 실패가 남아 있으면 [`QdbError::Stopped`]
//! 2. [`Request::build`]: 계약 위반은 네트워크 호출 전에 반환
//! 3. [`Transport::send`] → HTTP 상태 확인 → [`Response::parse`]
//! 4. 티켓/udata 흡수, 에러 정보 기록, 활성 컨텍스트 변경 알림

use tracing::{debug, trace, warn};

use crate::codec::{ErrorInfo, Request, Response, SessionParams, normalize_operation};
use crate::config::ClientConfig;
use crate::constants::{ACTION_HEADER, CONTENT_TYPE};
use crate::context::{ActiveContext, ClientEvent, EventHandler};
use crate::error::{QdbError, Result};
use crate::schema::{Schema, SchemaCache};
use crate::transport::{HttpRequest, Transport};
use crate::xml::ParseOptions;

#[cfg(feature = "client")]
use crate::transport::HttpTransport;

/// 테이블형 데이터베이스 서비스 클라이언트
///
/// # 예시
///
/// ```no_run
/// use qdbapi::client::Client;
/// use qdbapi::config::ClientConfig;
///
/// # async fn example() -> qdbapi::Result<()> {
/// let config: ClientConfig = "realm = \"acme\"\napp_token = \"tok\"".parse()?;
/// let mut client = Client::from_config(&config)?;
/// let auth = client.authenticate("me@example.com", "secret", None).await?;
/// println!("user {}", auth.user_id);
/// # Ok(())
/// # }
/// ```
pub struct Client<T: Transport> {
    transport: T,
    session: SessionParams,
    parse_options: ParseOptions,
    stop_on_error: bool,
    cache_schemas: bool,
    schema_cache: SchemaCache,
    /// 마지막으로 가져온 스키마
    schema: Option<Schema>,
    context: ActiveContext,
    handlers: Vec<Box<dyn EventHandler>>,
    error: ErrorInfo,
    last_error: String,
    request_succeeded: bool,
    last_request: Option<HttpRequest>,
    last_response: Option<String>,
}

#[cfg(feature = "client")]
impl Client<HttpTransport> {
    /// 설정에서 reqwest 기반 클라이언트를 만듭니다.
    ///
    /// # 에러
    ///
    /// - [`QdbError::ConfigInvalid`]: 설정 검증 실패
    /// - [`QdbError::Http`]: HTTP 클라이언트 생성 실패
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        config.validate()?;
        let transport = HttpTransport::new(&config.base_url())?;
        Ok(Self::with_config(transport, config))
    }
}

impl<T: Transport> Client<T> {
    /// 기본 설정으로 클라이언트를 만듭니다. 인증 정보는 이후 설정합니다.
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            session: SessionParams::default(),
            parse_options: ParseOptions::default(),
            stop_on_error: false,
            cache_schemas: false,
            schema_cache: SchemaCache::default(),
            schema: None,
            context: ActiveContext::default(),
            handlers: Vec::new(),
            error: ErrorInfo::default(),
            last_error: String::new(),
            request_succeeded: false,
            last_request: None,
            last_response: None,
        }
    }

    /// 설정 값을 적용한 클라이언트를 만듭니다.
    pub fn with_config(transport: T, config: &ClientConfig) -> Self {
        let mut client = Self::new(transport);
        client.session = SessionParams {
            ticket: config.ticket.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            app_token: config.app_token.clone(),
            udata: config.udata.clone(),
            rdr: config.rdr.clone(),
            xsl: config.xsl.clone(),
            encoding: config.encoding.clone(),
        };
        client.parse_options = config.parse;
        client.stop_on_error = config.stop_on_error;
        client.cache_schemas = config.cache_schemas;
        client
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn session(&self) -> &SessionParams {
        &self.session
    }

    /// 인증/에코 지시자를 직접 수정합니다.
    pub fn session_mut(&mut self) -> &mut SessionParams {
        &mut self.session
    }

    pub fn ticket(&self) -> Option<&str> {
        self.session.ticket.as_deref()
    }

    pub fn set_ticket(&mut self, ticket: Option<&str>) {
        self.session.ticket = ticket.map(str::to_string);
    }

    pub fn set_credentials(&mut self, username: &str, password: &str) {
        self.session.username = Some(username.to_string());
        self.session.password = Some(password.to_string());
    }

    pub fn set_app_token(&mut self, app_token: Option<&str>) {
        self.session.app_token = app_token.map(str::to_string);
    }

    pub fn set_parse_options(&mut self, options: ParseOptions) {
        self.parse_options = options;
    }

    pub fn set_stop_on_error(&mut self, stop: bool) {
        self.stop_on_error = stop;
    }

    /// 스키마 캐시를 켜거나 끕니다. 끄면 캐시가 비워집니다.
    pub fn set_cache_schemas(&mut self, cache: bool) {
        self.cache_schemas = cache;
        if !cache {
            self.schema_cache.clear();
        }
    }

    pub fn cache_schemas(&self) -> bool {
        self.cache_schemas
    }

    pub(crate) fn schema_cache(&self) -> &SchemaCache {
        &self.schema_cache
    }

    pub(crate) fn schema_cache_mut(&mut self) -> &mut SchemaCache {
        &mut self.schema_cache
    }

    /// 이벤트 구독자를 등록합니다. 이벤트는 요청 처리 중 동기적으로 전달됩니다.
    pub fn subscribe<H: EventHandler + 'static>(&mut self, handler: H) {
        self.handlers.push(Box::new(handler));
    }

    pub fn context(&self) -> &ActiveContext {
        &self.context
    }

    pub fn active_table(&self) -> Option<&str> {
        self.context.table_id()
    }

    pub fn active_record(&self) -> Option<u64> {
        self.context.record_id()
    }

    pub fn active_field(&self) -> Option<u32> {
        self.context.field_id()
    }

    /// 활성 테이블을 설정하고 변경을 즉시 알립니다.
    pub fn set_active_table(&mut self, table_id: Option<&str>) {
        self.context.set_table(table_id);
        self.notify_context_changes();
    }

    /// 활성 레코드를 설정하고 변경을 즉시 알립니다.
    pub fn set_active_record(&mut self, record_id: Option<u64>) {
        self.context.set_record(record_id);
        self.notify_context_changes();
    }

    /// 활성 필드를 설정하고 변경을 즉시 알립니다.
    pub fn set_active_field(&mut self, field_id: Option<u32>) {
        self.context.set_field(field_id);
        self.notify_context_changes();
    }

    /// 응답 처리 중 레코드 컨텍스트만 갱신합니다 (알림은 다음 주기에).
    pub(crate) fn track_record(&mut self, record_id: Option<u64>) {
        self.context.set_record(record_id);
    }

    pub(crate) fn track_field(&mut self, field_id: Option<u32>) {
        self.context.set_field(field_id);
    }

    /// 마지막으로 가져온 스키마
    pub fn schema(&self) -> Option<&Schema> {
        self.schema.as_ref()
    }

    pub(crate) fn set_schema(&mut self, schema: Schema) {
        self.schema = Some(schema);
    }

    /// 마지막 실패의 설명. 성공하면 빈 문자열.
    pub fn last_error(&self) -> &str {
        &self.last_error
    }

    pub fn request_succeeded(&self) -> bool {
        self.request_succeeded
    }

    /// 마지막 응답의 에러 정보
    pub fn error_info(&self) -> &ErrorInfo {
        &self.error
    }

    pub fn last_request(&self) -> Option<&HttpRequest> {
        self.last_request.as_ref()
    }

    pub fn last_response(&self) -> Option<&str> {
        self.last_response.as_deref()
    }

    /// 마지막 에러를 지웁니다. 중단 모드의 차단이 풀립니다.
    pub fn clear_error(&mut self) {
        self.last_error.clear();
        self.error = ErrorInfo::default();
    }

    /// 요청을 보내고 응답을 파싱합니다.
    ///
    /// 대상 테이블이 있는 요청은 그 테이블을 활성 테이블로 만듭니다.
    ///
    /// # 에러
    ///
    /// - [`QdbError::Stopped`]: 중단 모드에서 이전 실패가 남아 있음
    /// - [`QdbError::NotAuthenticated`], [`QdbError::NoActiveTable`]: 네트워크 호출 전 계약 위반
    /// - [`QdbError::Transport`]: 전송 실패
    /// - [`QdbError::HttpStatus`]: 2xx가 아닌 HTTP 상태
    /// - [`QdbError::Xml`]: 응답이 올바른 XML이 아님
    /// - [`QdbError::Protocol`]: 응답의 errcode가 `"0"`이 아님
    pub async fn send_request(&mut self, request: Request) -> Result<Response> {
        if self.stop_on_error && !self.last_error.is_empty() {
            return Err(QdbError::Stopped {
                last_error: self.last_error.clone(),
            });
        }

        let envelope = match request.build(&self.session) {
            Ok(envelope) => envelope,
            Err(e) => {
                self.error = ErrorInfo::default();
                return Err(self.fail(&normalize_operation(request.operation()), e));
            }
        };
        if let Some(table) = request.table_id() {
            self.context.set_table(Some(table));
        }

        debug!(
            path = %envelope.path,
            action = %envelope.action,
            body = %envelope.body,
            "sending request"
        );
        self.emit(&ClientEvent::SendRequest {
            action: envelope.action.clone(),
            path: envelope.path.clone(),
        });

        let http = HttpRequest {
            path: envelope.path.clone(),
            headers: vec![
                ("Content-Type".to_string(), CONTENT_TYPE.to_string()),
                (ACTION_HEADER.to_string(), envelope.action.clone()),
            ],
            body: envelope.body,
        };
        let sent = self.transport.send(&http).await;
        self.last_request = Some(http);

        let parsed = match sent {
            Err(e) => Err(QdbError::Transport {
                operation: envelope.action.clone(),
                message: e.to_string(),
            }),
            Ok(resp) if !resp.is_success() => Err(QdbError::HttpStatus {
                status: resp.status,
            }),
            Ok(resp) => {
                trace!(action = %envelope.action, body = %resp.body, "received response");
                let parsed = if envelope.html {
                    Ok(Response::html(&resp.body))
                } else {
                    Response::parse(&resp.body, &self.parse_options)
                };
                self.last_response = Some(resp.body);
                parsed
            }
        };
        let response = match parsed {
            Ok(response) => response,
            Err(e) => {
                self.error = ErrorInfo::default();
                return Err(self.fail(&envelope.action, e));
            }
        };

        self.absorb_session_values(&response);
        self.emit(&ClientEvent::ProcessResponse {
            action: envelope.action.clone(),
        });

        self.error = response.error_info().clone();
        if let Some(err) = self.error.to_error() {
            return Err(self.fail(&envelope.action, err));
        }

        self.request_succeeded = true;
        self.last_error.clear();
        self.emit(&ClientEvent::RequestSucceeded {
            action: envelope.action,
        });
        self.notify_context_changes();
        Ok(response)
    }

    /// 응답의 티켓(세션에 없을 때만)과 udata를 세션에 반영합니다.
    fn absorb_session_values(&mut self, response: &Response) {
        if self.session.ticket.is_none() {
            if let Some(ticket) = response.value("ticket") {
                self.session.ticket = Some(ticket.to_string());
            }
        }
        if let Some(udata) = response.value("udata") {
            self.session.udata = Some(udata.to_string());
        }
    }

    /// 실패를 세션에 기록하고 같은 에러를 돌려줍니다.
    fn fail(&mut self, action: &str, error: QdbError) -> QdbError {
        self.request_succeeded = false;
        self.last_error = error.to_string();
        warn!(action, error = %self.last_error, "request failed");
        self.emit(&ClientEvent::RequestFailed {
            action: action.to_string(),
            error: self.last_error.clone(),
        });
        self.notify_context_changes();
        error
    }

    fn notify_context_changes(&mut self) {
        for event in self.context.take_changes() {
            self.emit(&event);
        }
    }

    fn emit(&self, event: &ClientEvent) {
        for handler in &self.handlers {
            handler.on_event(event);
        }
    }
}
