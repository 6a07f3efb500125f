//! Impls - 実装（開発用・テスト用）
//!
//! # 含まれる実装
//! - **InMemoryClaimStore**: 単一プロセス用の ClaimStore
//! - **InMemoryJobConfigs**: 設定ファイルから作る JobConfigSource
//!
//! # 本番用実装
//! 本番用の ClaimStore（行ロック付きの RDBMS など）は別クレートに配置します。

pub mod inmem_config;
pub mod inmem_store;

pub use self::inmem_config::InMemoryJobConfigs;
pub use self::inmem_store::InMemoryClaimStore;
