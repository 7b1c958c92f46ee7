//! # 任务提交与状态轮询
//!
//! ## 设计思路
//!
//! ```text
//! JobRequest ──submit──→ JobHandle ──start_polling──→ PollHandle
//!                                        │
//!                                        ├─ on_progress  (0..n 次)
//!                                        └─ on_finished / on_failed (至多一次)
//! ```
//!
//! - `JobApi` 是唯一的服务端抽象，`HttpJobApi` 是它的 HTTP 实现。
//! - 提交只发一次，不做重试；状态查询由 `poller` 驱动。
//! - 取消只停止本地观测，不会通知服务端。

mod api;
mod config;
mod error;
mod features;
mod http;
mod model;
mod params;
mod poller;

pub use api::JobApi;
pub use config::{PollConfig, ServerConfig};
pub use error::JobError;
pub use features::{FEATURES, Feature, find_feature};
pub use http::HttpJobApi;
pub(crate) use http::redact_url_for_log;
pub use model::{JobHandle, JobRequest, JobState, JobStatus};
pub use params::parse_params;
pub use poller::{
    CallbackObserver, JobObserver, PollCanceller, PollHandle, PollOutcome, PollState,
    start_polling,
};
