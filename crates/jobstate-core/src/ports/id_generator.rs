//! IdGenerator port - ID 生成の抽象化
//!
//! Used when a job-creation request does not name its own `jobId`.
//!
//! # 実装
//! - **UlidGenerator**: ULID ベース（本番用）

use ulid::Ulid;

use crate::domain::JobId;
use crate::ports::Clock;

/// IdGenerator は job id を生成
///
/// # ULID の特性
/// - 時刻でソート可能
/// - 分散環境で生成可能（調整不要）
pub trait IdGenerator: Send + Sync {
    fn generate_job_id(&self) -> JobId;
}

/// UlidGenerator は ULID ベースの ID 生成器
///
/// Clock を使って現在時刻ベースの ULID を生成します。
/// テスト時は FixedClock で timestamp 部分を固定できます。
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    fn next_ulid(&self) -> Ulid {
        let timestamp_ms = self.clock.now().timestamp_millis().max(0) as u64;
        Ulid::from_parts(timestamp_ms, rand::random())
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_job_id(&self) -> JobId {
        JobId::new(self.next_ulid().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{FixedClock, SystemClock};
    use chrono::{TimeZone, Utc};

    #[test]
    fn ulid_generator_generates_unique_ids() {
        let id_gen = UlidGenerator::new(SystemClock);

        let id1 = id_gen.generate_job_id();
        let id2 = id_gen.generate_job_id();
        let id3 = id_gen.generate_job_id();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
    }

    #[test]
    fn ulid_generator_with_fixed_clock_shares_timestamp() {
        let fixed_time = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let id_gen = UlidGenerator::new(FixedClock::new(fixed_time));

        let id1 = id_gen.generate_job_id();
        let id2 = id_gen.generate_job_id();

        // ランダム部分があるので ID は異なる
        assert_ne!(id1, id2);

        // timestamp 部分は同じ
        let ts1 = Ulid::from_string(id1.as_str()).unwrap().timestamp_ms();
        let ts2 = Ulid::from_string(id2.as_str()).unwrap().timestamp_ms();
        assert_eq!(ts1, ts2);
        assert_eq!(ts1, fixed_time.timestamp_millis() as u64);
    }
}
