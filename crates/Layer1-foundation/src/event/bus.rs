//! Change Bus - 속성 변경 알림 브로드캐스트
//!
//! 등록 순서대로 리스너에게 동기적으로 전달합니다.

use super::types::{Attribute, ChangeEvent};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, trace, warn};

// ============================================================================
// ChangeListener Trait
// ============================================================================

/// 리스너 ID
///
/// IDs grow monotonically, so ordering by ID is registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    fn new(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for ListenerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

/// 변경 알림 리스너 trait
pub trait ChangeListener: Send + Sync {
    /// 리스너 이름 (디버깅용)
    fn name(&self) -> &str {
        "anonymous"
    }

    /// 관심 있는 속성 (None이면 모든 속성)
    fn attributes(&self) -> Option<Vec<Attribute>> {
        None
    }

    /// 알림 처리
    fn on_change(&self, event: &ChangeEvent);
}

/// Adapts a closure into a [`ChangeListener`].
pub struct FnListener<F> {
    name: String,
    callback: F,
}

impl<F> FnListener<F>
where
    F: Fn(&ChangeEvent) + Send + Sync,
{
    pub fn new(name: impl Into<String>, callback: F) -> Self {
        Self {
            name: name.into(),
            callback,
        }
    }
}

impl<F> ChangeListener for FnListener<F>
where
    F: Fn(&ChangeEvent) + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn on_change(&self, event: &ChangeEvent) {
        (self.callback)(event)
    }
}

// ============================================================================
// ChangeFilter
// ============================================================================

/// 알림 필터
#[derive(Debug, Clone, Default)]
pub struct ChangeFilter {
    /// 속성 필터
    pub attributes: Option<Vec<Attribute>>,

    /// 소스 필터
    pub sources: Option<Vec<String>>,
}

impl ChangeFilter {
    /// 새 필터 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 속성 필터 추가
    pub fn with_attributes(mut self, attributes: Vec<Attribute>) -> Self {
        self.attributes = Some(attributes);
        self
    }

    /// 소스 필터 추가
    pub fn with_sources(mut self, sources: Vec<String>) -> Self {
        self.sources = Some(sources);
        self
    }

    /// 이벤트가 필터를 통과하는지 확인
    pub fn matches(&self, event: &ChangeEvent) -> bool {
        if let Some(ref attributes) = self.attributes {
            if !attributes.contains(&event.attribute) {
                return false;
            }
        }

        if let Some(ref sources) = self.sources {
            if !sources.contains(&event.source) {
                return false;
            }
        }

        true
    }
}

// ============================================================================
// ChangeBus
// ============================================================================

/// 변경 버스 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChangeBusConfig {
    /// 브로드캐스트 채널 용량
    pub channel_capacity: usize,

    /// 이벤트 히스토리 보관 개수
    pub history_size: usize,

    /// 디버그 모드 (모든 알림 로깅)
    pub debug_mode: bool,
}

impl Default for ChangeBusConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 64,
            history_size: 32,
            debug_mode: false,
        }
    }
}

/// 등록된 리스너 정보
#[derive(Clone)]
struct RegisteredListener {
    listener: Arc<dyn ChangeListener>,
    filter: Option<ChangeFilter>,
}

impl RegisteredListener {
    fn accepts(&self, event: &ChangeEvent) -> bool {
        match &self.filter {
            Some(filter) => filter.matches(event),
            None => match self.listener.attributes() {
                Some(attributes) => attributes.contains(&event.attribute),
                None => true,
            },
        }
    }
}

/// 변경 알림 버스
///
/// `publish` delivers on the caller's thread, to every listener registered at
/// the moment of the call, in registration order. A listener may subscribe or
/// unsubscribe from inside its callback; the change applies to the next event.
///
/// ```ignore
/// let bus = ChangeBus::new();
/// let id = bus.subscribe_fn("ui", |event| println!("{} changed", event.attribute));
/// bus.publish(ChangeEvent::new("download", Attribute::Status));
/// bus.unsubscribe(id);
/// ```
pub struct ChangeBus {
    /// 설정
    config: ChangeBusConfig,

    /// 브로드캐스트 채널 송신자
    sender: broadcast::Sender<ChangeEvent>,

    /// 등록된 리스너 (ID 순 = 등록 순)
    listeners: RwLock<BTreeMap<ListenerId, RegisteredListener>>,

    /// 리스너 ID 카운터
    listener_counter: AtomicU64,

    /// 이벤트 히스토리
    history: Mutex<VecDeque<ChangeEvent>>,

    /// 발행된 이벤트 수
    event_count: AtomicU64,
}

impl ChangeBus {
    /// 기본 설정으로 버스 생성
    pub fn new() -> Self {
        Self::with_config(ChangeBusConfig::default())
    }

    /// 커스텀 설정으로 버스 생성
    pub fn with_config(config: ChangeBusConfig) -> Self {
        let (sender, _) = broadcast::channel(config.channel_capacity.max(1));

        Self {
            config,
            sender,
            listeners: RwLock::new(BTreeMap::new()),
            listener_counter: AtomicU64::new(0),
            history: Mutex::new(VecDeque::new()),
            event_count: AtomicU64::new(0),
        }
    }

    /// 리스너 등록
    pub fn subscribe(&self, listener: Arc<dyn ChangeListener>) -> ListenerId {
        self.subscribe_with_filter(listener, None)
    }

    /// 클로저 리스너 등록
    pub fn subscribe_fn<F>(&self, name: impl Into<String>, callback: F) -> ListenerId
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        self.subscribe(Arc::new(FnListener::new(name, callback)))
    }

    /// 필터와 함께 리스너 등록
    pub fn subscribe_with_filter(
        &self,
        listener: Arc<dyn ChangeListener>,
        filter: Option<ChangeFilter>,
    ) -> ListenerId {
        let id = ListenerId::new(self.listener_counter.fetch_add(1, Ordering::SeqCst));

        debug!(
            listener_name = listener.name(),
            listener_id = %id,
            "Registering change listener"
        );

        self.listeners
            .write()
            .insert(id, RegisteredListener { listener, filter });

        id
    }

    /// 리스너 해제
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let removed = self.listeners.write().remove(&id).is_some();

        if removed {
            debug!(listener_id = %id, "Unregistered change listener");
        }

        removed
    }

    /// 알림 발행
    pub fn publish(&self, mut event: ChangeEvent) {
        event.sequence = self.event_count.fetch_add(1, Ordering::SeqCst) + 1;

        if self.config.debug_mode {
            trace!(
                source = %event.source,
                attribute = %event.attribute,
                "Publishing change #{}", event.sequence
            );
        }

        // 히스토리에 추가
        if self.config.history_size > 0 {
            let mut history = self.history.lock();
            history.push_back(event.clone());
            while history.len() > self.config.history_size {
                history.pop_front();
            }
        }

        // 수신자가 없으면 실패하지만 무시
        let _ = self.sender.send(event.clone());

        // Snapshot so callbacks can (un)subscribe without deadlocking.
        let targets: Vec<(ListenerId, RegisteredListener)> = self
            .listeners
            .read()
            .iter()
            .map(|(id, registered)| (*id, registered.clone()))
            .collect();

        for (id, registered) in targets {
            if !registered.accepts(&event) {
                continue;
            }

            if self.config.debug_mode {
                trace!(
                    listener_id = %id,
                    listener_name = registered.listener.name(),
                    attribute = %event.attribute,
                    "Delivering change to listener"
                );
            }

            let delivered = catch_unwind(AssertUnwindSafe(|| registered.listener.on_change(&event)));
            if delivered.is_err() {
                warn!(
                    listener_id = %id,
                    listener_name = registered.listener.name(),
                    attribute = %event.attribute,
                    "Change listener panicked"
                );
            }
        }
    }

    /// 브로드캐스트 수신자 생성 (스트림 방식)
    pub fn receiver(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }

    /// 최근 이벤트 히스토리 조회 (오래된 순)
    pub fn history(&self, limit: Option<usize>) -> Vec<ChangeEvent> {
        let history = self.history.lock();
        let limit = limit.unwrap_or(history.len()).min(history.len());
        history.iter().skip(history.len() - limit).cloned().collect()
    }

    /// 필터로 히스토리 검색
    pub fn search_history(&self, filter: &ChangeFilter) -> Vec<ChangeEvent> {
        self.history
            .lock()
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect()
    }

    /// 등록된 리스너 수
    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// 총 발행된 이벤트 수
    pub fn event_count(&self) -> u64 {
        self.event_count.load(Ordering::SeqCst)
    }

    /// 히스토리 클리어
    pub fn clear_history(&self) {
        self.history.lock().clear();
    }
}

impl Default for ChangeBus {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// 테스트
// ============================================================================
