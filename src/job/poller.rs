//! # 轮询状态机
//!
//! ## 设计思路
//!
//! ```text
//!            ┌──────────── queued / running / unknown ─────────────┐
//!            ↓                                                     │
//!  start → Polling ── finished ──→ Finished   (onProgress + onFinished)
//!            │ ───── failed ────→ Failed     (onFailed，服务端原文)
//!            │ ── 查询失败/超限 ─→ Aborted    (onFailed，查询失败)
//!            └── cancel() ──────→ Cancelled  (不再回调)
//! ```
//!
//! ## 实现思路
//!
//! - 顺序轮询：等上一次查询返回后再等待下一个间隔，同一任务不会有并发中的查询，
//!   也就不存在乱序返回的问题。
//! - 状态保存在 `AtomicU8` 中，所有离开 `Polling` 的转换都用 compare-exchange，
//!   因此终态只会被抢占一次，任何回调都不会重复触发。
//! - 回调投递与取消共用一把投递锁：投递时在锁内复查 `Polling` 并调用回调，
//!   `cancel()` 在锁内完成状态转换。`cancel()` 返回后不会再有回调开始执行；
//!   在回调内部对同一轮询调用 `cancel()` 不会死锁。
//! - 取消不通知服务端，服务端任务可能仍在运行。

use std::cell::Cell;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::Instant;

use super::{JobApi, JobError, JobHandle, JobState, PollConfig};

const UNKNOWN_FAILURE_MESSAGE: &str = "未知错误";

thread_local! {
    /// 当前线程正在为哪一个轮询投递回调（`PollShared` 地址，0 表示无）。
    static DELIVERING: Cell<usize> = const { Cell::new(0) };
}

/// 轮询过程的观察者。核心只通过它通知展示层，不依赖任何 UI 框架。
pub trait JobObserver: Send + Sync {
    /// 非终态快照，以及 `finished` 时的最后一次快照。
    fn on_progress(&self, progress: u8, state: JobState);

    /// 任务完成，结果地址按服务端顺序给出。每个任务最多触发一次。
    fn on_finished(&self, results: &[String]);

    /// 任务失败或轮询中止。每个任务最多触发一次。
    ///
    /// `JobError::JobFailed` 为服务端原文；`Query` / `Deadline` 表示客户端放弃观测。
    fn on_failed(&self, error: &JobError);
}

/// 用三个闭包组装的观察者。
pub struct CallbackObserver<P, F, E> {
    on_progress: P,
    on_finished: F,
    on_failed: E,
}

impl<P, F, E> CallbackObserver<P, F, E>
where
    P: Fn(u8, JobState) + Send + Sync,
    F: Fn(&[String]) + Send + Sync,
    E: Fn(&JobError) + Send + Sync,
{
    pub fn new(on_progress: P, on_finished: F, on_failed: E) -> Self {
        Self {
            on_progress,
            on_finished,
            on_failed,
        }
    }
}

impl<P, F, E> JobObserver for CallbackObserver<P, F, E>
where
    P: Fn(u8, JobState) + Send + Sync,
    F: Fn(&[String]) + Send + Sync,
    E: Fn(&JobError) + Send + Sync,
{
    fn on_progress(&self, progress: u8, state: JobState) {
        (self.on_progress)(progress, state)
    }

    fn on_finished(&self, results: &[String]) {
        (self.on_finished)(results)
    }

    fn on_failed(&self, error: &JobError) {
        (self.on_failed)(error)
    }
}

/// 轮询状态。除 `Polling` 外均为终态。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PollState {
    Polling = 0,
    Finished = 1,
    Failed = 2,
    Aborted = 3,
    Cancelled = 4,
}

impl PollState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Polling,
            1 => Self::Finished,
            2 => Self::Failed,
            3 => Self::Aborted,
            _ => Self::Cancelled,
        }
    }

    pub fn is_terminal(self) -> bool {
        self != Self::Polling
    }
}

/// 一轮轮询的最终结果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Finished(Vec<String>),
    /// 服务端报告失败，消息为服务端原文。
    Failed(String),
    /// 客户端放弃观测（查询失败或超出轮询上限）。
    Aborted(JobError),
    Cancelled,
}

impl PollOutcome {
    /// 转成错误；完成时返回结果列表。
    pub fn into_result(self) -> Result<Vec<String>, JobError> {
        match self {
            Self::Finished(results) => Ok(results),
            Self::Failed(message) => Err(JobError::JobFailed(message)),
            Self::Aborted(err) => Err(err),
            Self::Cancelled => Err(JobError::Query("轮询已取消".to_string())),
        }
    }
}

struct PollShared {
    state: AtomicU8,
    delivery: Mutex<()>,
}

impl PollShared {
    fn new() -> Self {
        Self {
            state: AtomicU8::new(PollState::Polling as u8),
            delivery: Mutex::new(()),
        }
    }

    fn id(&self) -> usize {
        self as *const Self as usize
    }

    fn state(&self) -> PollState {
        PollState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn is_polling(&self) -> bool {
        self.state() == PollState::Polling
    }

    /// 从 `Polling` 转到终态；已是终态时返回 `false`。
    fn transition(&self, to: PollState) -> bool {
        self.state
            .compare_exchange(
                PollState::Polling as u8,
                to as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok()
    }

    /// 回调 panic 会使锁中毒，取消仍然要能进行。
    fn lock_delivery(&self) -> MutexGuard<'_, ()> {
        self.delivery.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 仍处于 `Polling` 时在投递锁内执行 `deliver`；否则返回 `false`。
    fn deliver_if_polling(&self, deliver: impl FnOnce()) -> bool {
        let _guard = self.lock_delivery();
        if !self.is_polling() {
            return false;
        }
        self.run_delivering(deliver);
        true
    }

    /// 在投递锁内转到终态并投递终态回调；已是终态时返回 `false`。
    fn finish_with(&self, to: PollState, deliver: impl FnOnce()) -> bool {
        let _guard = self.lock_delivery();
        if !self.transition(to) {
            return false;
        }
        self.run_delivering(deliver);
        true
    }

    fn run_delivering(&self, deliver: impl FnOnce()) {
        let _marker = DeliveringMarker::enter(self.id());
        deliver();
    }

    fn cancel(&self) -> bool {
        // 回调内部取消同一轮询时，本线程已持有投递锁
        if DELIVERING.with(Cell::get) == self.id() {
            return self.transition(PollState::Cancelled);
        }

        let _guard = self.lock_delivery();
        self.transition(PollState::Cancelled)
    }
}

struct DeliveringMarker {
    previous: usize,
}

impl DeliveringMarker {
    fn enter(id: usize) -> Self {
        Self {
            previous: DELIVERING.with(|current| current.replace(id)),
        }
    }
}

impl Drop for DeliveringMarker {
    fn drop(&mut self) {
        DELIVERING.with(|current| current.set(self.previous));
    }
}

/// 轮询句柄：查询状态、取消、等待结果。
///
/// 丢弃句柄不会停止轮询，后台任务会一直运行到终态。
pub struct PollHandle {
    job: JobHandle,
    shared: Arc<PollShared>,
    task: JoinHandle<PollOutcome>,
}

impl PollHandle {
    pub fn job(&self) -> &JobHandle {
        &self.job
    }

    pub fn state(&self) -> PollState {
        self.shared.state()
    }

    /// 取消轮询。
    ///
    /// 返回 `true` 表示本次调用完成了取消；已处于终态时是空操作并返回 `false`。
    /// 已经投递的回调不会撤回，服务端也不会收到通知。
    pub fn cancel(&self) -> bool {
        self.canceller().cancel()
    }

    /// 可单独持有的取消句柄，便于在 `join` 等待期间取消。
    pub fn canceller(&self) -> PollCanceller {
        PollCanceller {
            job: self.job.clone(),
            shared: Arc::clone(&self.shared),
            abort: self.task.abort_handle(),
        }
    }

    /// 等待轮询结束。
    pub async fn join(self) -> PollOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(err) if err.is_cancelled() => PollOutcome::Cancelled,
            Err(err) => {
                log::error!("❌ 轮询任务异常退出 - job_id: {}：{}", self.job, err);
                PollOutcome::Aborted(JobError::Query(format!("轮询任务异常退出：{}", err)))
            }
        }
    }
}

/// 取消句柄，语义与 [`PollHandle::cancel`] 相同。
#[derive(Clone)]
pub struct PollCanceller {
    job: JobHandle,
    shared: Arc<PollShared>,
    abort: AbortHandle,
}

impl PollCanceller {
    pub fn cancel(&self) -> bool {
        if !self.shared.cancel() {
            return false;
        }

        self.abort.abort();
        log::info!("🛑 已取消轮询 - job_id: {}", self.job);
        true
    }
}

/// 启动后台轮询。
///
/// 必须在 tokio 运行时内调用；每个 `JobHandle` 只应启动一次。
pub fn start_polling(
    api: Arc<dyn JobApi>,
    job: JobHandle,
    config: PollConfig,
    observer: Arc<dyn JobObserver>,
) -> Result<PollHandle, JobError> {
    config.validate()?;
    let runtime = tokio::runtime::Handle::try_current()
        .map_err(|_| JobError::Config("轮询需要在 tokio 运行时中启动".to_string()))?;

    let shared = Arc::new(PollShared::new());

    log::info!(
        "🔁 开始轮询 - job_id: {} interval={}ms max_attempts={:?} timeout={:?}s",
        job,
        config.interval_ms,
        config.max_attempts,
        config.timeout_secs
    );

    let task = runtime.spawn(poll_loop(
        api,
        job.clone(),
        config,
        observer,
        Arc::clone(&shared),
    ));

    Ok(PollHandle { job, shared, task })
}

async fn poll_loop(
    api: Arc<dyn JobApi>,
    job: JobHandle,
    config: PollConfig,
    observer: Arc<dyn JobObserver>,
    shared: Arc<PollShared>,
) -> PollOutcome {
    let started = Instant::now();
    let deadline = config.timeout().map(|timeout| started + timeout);
    let mut attempts: u32 = 0;

    loop {
        tokio::time::sleep(config.interval()).await;

        if !shared.is_polling() {
            return PollOutcome::Cancelled;
        }
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return abort(&shared, observer.as_ref(), &job, deadline_error(&config, attempts));
        }

        attempts = attempts.saturating_add(1);
        log::debug!("📡 查询任务状态 - job_id: {} seq={}", job, attempts);

        let fetched = match deadline {
            Some(deadline) => {
                match tokio::time::timeout_at(deadline, api.fetch_status(&job)).await {
                    Ok(result) => result,
                    Err(_) => {
                        return abort(&shared, observer.as_ref(), &job, deadline_error(&config, attempts));
                    }
                }
            }
            None => api.fetch_status(&job).await,
        };

        if !shared.is_polling() {
            return PollOutcome::Cancelled;
        }

        let status = match fetched {
            Ok(status) => status,
            Err(err) => {
                let err = match err {
                    JobError::Query(_) => err,
                    other => JobError::Query(other.to_string()),
                };
                return abort(&shared, observer.as_ref(), &job, err);
            }
        };

        match status.state {
            JobState::Finished => {
                let delivered = shared.finish_with(PollState::Finished, || {
                    observer.on_progress(status.progress, status.state);
                    observer.on_finished(&status.results);
                });
                if !delivered {
                    return PollOutcome::Cancelled;
                }
                log::info!(
                    "✅ 任务完成 - job_id: {} results={} queries={} elapsed={}ms",
                    job,
                    status.results.len(),
                    attempts,
                    started.elapsed().as_millis()
                );
                return PollOutcome::Finished(status.results);
            }
            JobState::Failed => {
                let message = status
                    .error
                    .unwrap_or_else(|| UNKNOWN_FAILURE_MESSAGE.to_string());
                let error = JobError::JobFailed(message.clone());
                if !shared.finish_with(PollState::Failed, || observer.on_failed(&error)) {
                    return PollOutcome::Cancelled;
                }
                log::warn!("⚠️ 任务失败 - job_id: {}：{}", job, message);
                return PollOutcome::Failed(message);
            }
            state => {
                if !shared.deliver_if_polling(|| observer.on_progress(status.progress, state)) {
                    return PollOutcome::Cancelled;
                }

                if config.max_attempts.is_some_and(|max| attempts >= max) {
                    return abort(&shared, observer.as_ref(), &job, deadline_error(&config, attempts));
                }
            }
        }
    }
}

fn abort(shared: &PollShared, observer: &dyn JobObserver, job: &JobHandle, err: JobError) -> PollOutcome {
    if !shared.finish_with(PollState::Aborted, || observer.on_failed(&err)) {
        return PollOutcome::Cancelled;
    }

    log::warn!("⚠️ 轮询中止 - job_id: {} ({})：{}", job, err.code(), err);
    PollOutcome::Aborted(err)
}

fn deadline_error(config: &PollConfig, attempts: u32) -> JobError {
    match (config.max_attempts, config.timeout_secs) {
        (Some(max), _) if attempts >= max => {
            JobError::Deadline(format!("已查询 {} 次仍未结束", attempts))
        }
        (_, Some(secs)) => JobError::Deadline(format!("超过 {} 秒仍未结束", secs)),
        _ => JobError::Deadline(format!("已查询 {} 次仍未结束", attempts)),
    }
}
