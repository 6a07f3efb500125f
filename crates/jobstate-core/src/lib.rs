//! jobstate-core
//!
//! Job/task state machine with an exclusive batch-claim protocol.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, state, task, job, sequencer, retry, config, outcome, dto, errors）
//! - **ports**: 抽象化レイヤー（ClaimStore, JobConfigSource, Clock, IdGenerator）
//! - **impls**: 実装（InMemoryClaimStore など開発用）
//! - **app**: アプリケーションロジック（JobService, HandlerRegistry, WorkerGroup）
//! - **config**: TOML の設定ファイル

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;
