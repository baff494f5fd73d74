//! 활성 컨텍스트 상태 기계: "현재" 테이블/레코드/필드와 변경 알림
//!
//! 세터는 값이 새로운 non-null 값으로 바뀔 때 하위 상태를 즉시 초기화합니다
//! (테이블 → 레코드·필드, 레코드 → 필드). 알림은 요청 주기마다
//! [`ActiveContext::take_changes`]가 직전 주기 값과 비교해 만들어 냅니다.

/// 클라이언트가 구독자에게 동기적으로 전달하는 이벤트
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// 요청 전송 직전
    SendRequest { action: String, path: String },
    /// 응답 수신 후 파싱 완료
    ProcessResponse { action: String },
    RequestSucceeded { action: String },
    RequestFailed { action: String, error: String },
    /// 활성 테이블 변경
    TableChanged(String),
    /// 활성 레코드 변경
    RecordChanged(u64),
    /// 활성 필드 변경
    FieldChanged(u32),
}

/// 이벤트 구독자
pub trait EventHandler: Send + Sync {
    fn on_event(&self, event: &ClientEvent);
}

impl<F> EventHandler for F
where
    F: Fn(&ClientEvent) + Send + Sync,
{
    fn on_event(&self, event: &ClientEvent) {
        self(event)
    }
}

/// 현재 테이블 ID, 레코드 ID, 필드 ID (각각 독립적으로 null 가능)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveContext {
    table_id: Option<String>,
    record_id: Option<u64>,
    field_id: Option<u32>,
    prev_table_id: Option<String>,
    prev_record_id: Option<u64>,
    prev_field_id: Option<u32>,
}

impl ActiveContext {
    pub fn table_id(&self) -> Option<&str> {
        self.table_id.as_deref()
    }

    pub fn record_id(&self) -> Option<u64> {
        self.record_id
    }

    pub fn field_id(&self) -> Option<u32> {
        self.field_id
    }

    /// 활성 테이블을 설정합니다. 다른 non-null 값이면 레코드와 필드를 초기화합니다.
    ///
    /// # 예시
    ///
    /// ```
    /// use qdbapi::context::ActiveContext;
    ///
    /// let mut ctx = ActiveContext::default();
    /// ctx.set_table(Some("bdb5rjd6h"));
    /// ctx.set_record(Some(7));
    /// ctx.set_table(Some("bdb5rjd6h"));
    /// assert_eq!(ctx.record_id(), Some(7));
    /// ctx.set_table(Some("bdcagynhs"));
    /// assert_eq!(ctx.record_id(), None);
    /// ```
    pub fn set_table(&mut self, table_id: Option<&str>) {
        if let Some(new) = table_id {
            if self.table_id.as_deref() != Some(new) {
                self.record_id = None;
                self.field_id = None;
            }
        }
        self.table_id = table_id.map(str::to_string);
    }

    /// 활성 레코드를 설정합니다. 다른 non-null 값이면 필드를 초기화합니다.
    pub fn set_record(&mut self, record_id: Option<u64>) {
        if record_id.is_some() && record_id != self.record_id {
            self.field_id = None;
        }
        self.record_id = record_id;
    }

    pub fn set_field(&mut self, field_id: Option<u32>) {
        self.field_id = field_id;
    }

    /// 모든 값을 지웁니다 (알림 기준값은 유지).
    pub fn clear(&mut self) {
        self.table_id = None;
        self.record_id = None;
        self.field_id = None;
    }

    /// 직전 주기 이후의 변경을 이벤트로 만들고 현재 값을 새 기준으로 삼습니다.
    ///
    /// null로 바뀐 값과 같은 값으로의 재설정은 알리지 않습니다.
    pub fn take_changes(&mut self) -> Vec<ClientEvent> {
        let mut events = Vec::new();

        if let Some(table) = &self.table_id {
            if self.prev_table_id.as_ref() != Some(table) {
                events.push(ClientEvent::TableChanged(table.clone()));
            }
        }
        self.prev_table_id = self.table_id.clone();

        if let Some(rid) = self.record_id {
            if self.prev_record_id != Some(rid) {
                events.push(ClientEvent::RecordChanged(rid));
            }
        }
        self.prev_record_id = self.record_id;

        if let Some(fid) = self.field_id {
            if self.prev_field_id != Some(fid) {
                events.push(ClientEvent::FieldChanged(fid));
            }
        }
        self.prev_field_id = self.field_id;

        events
    }
}
