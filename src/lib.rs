//! # NanoImage 作业客户端 — 库入口
//!
//! ## 架构总览
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  main.rs (clap 命令行)                                    │
//! │     run / status / health / features                      │
//! └───────┬──────────────────────────────────────────────────┘
//!         ↓
//! ┌───────┼──────────────────────────────────────────────────┐
//! │  client ── JobClient：参数 → 预处理 → 提交 → 轮询          │
//! │     │                                                    │
//! │     ├─ image_prep   读取、降采样、JPEG 重编码（永不失败）    │
//! │     ├─ job          JobApi / HttpJobApi / 轮询状态机       │
//! │     └─ present      终端观察者、结果地址补全与下载           │
//! │                                                          │
//! │  config ── ClientConfig（JSON 文件 + 环境变量 + 命令行）   │
//! │  error  ── AppError（汇总各阶段错误）                      │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 模块职责
//!
//! | 模块 | 职责 |
//! |------|------|
//! | [`error`] | 统一错误类型 `AppError` |
//! | [`config`] | 客户端配置的加载、覆盖与校验 |
//! | [`image_prep`] | 上传前的图片压缩，失败时回退原图 |
//! | [`job`] | 任务提交、状态查询、轮询与取消 |
//! | [`client`] | 单次作业的完整编排 |
//! | [`present`] | 把进度与结果呈现给用户 |

pub mod client;
pub mod config;
pub mod error;
pub mod image_prep;
pub mod job;
pub mod present;

pub use client::{JobClient, SubmittedJob};
pub use config::ClientConfig;
pub use error::AppError;
