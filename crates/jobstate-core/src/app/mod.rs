//! App - アプリケーション層
//!
//! ports を組み合わせて job ライフサイクルを実装します。
//!
//! # 主要コンポーネント
//! - **JobService**: create / claim / record / reset / delete / query
//! - **HandlerRegistry**: task name → handler
//! - **WorkerGroup**: ポーリングループ（claim→handle→record）
//! - **JobQuery**: 一覧の絞り込みと並べ替え
//! - **JobCounts**: state ごとの件数

pub mod query;
pub mod runtime;
pub mod service;
pub mod status;
pub mod worker_loop;

pub use self::query::{JobQuery, JobSort, SortDirection, SortField};
pub use self::runtime::{HandlerRegistry, TaskHandler};
pub use self::service::JobService;
pub use self::status::JobCounts;
pub use self::worker_loop::{WorkerGroup, WorkerSettings};
