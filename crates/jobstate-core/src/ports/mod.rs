//! Ports - 抽象化レイヤー
//!
//! 各 trait は外部の協調者（record store, 設定ソース, 時刻, ID 生成）への
//! インターフェースで、`app::JobService` はこれらだけを通して動きます。
//!
//! # 設計原則
//! - 共有された transactional record store が唯一の正本
//! - worker 同士は store を通してのみ協調する（in-memory のキャッシュは持たない）

pub mod claim_store;
pub mod clock;
pub mod config_source;
pub mod id_generator;

pub use self::claim_store::{ClaimQuery, ClaimStore, JobFilter, StoreError};
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::config_source::JobConfigSource;
pub use self::id_generator::{IdGenerator, UlidGenerator};
