//! Drives the two periodic jobs: a poll at a fixed second of every minute and
//! a backup at local midnight.
//!
//! Each job keeps its own wall-clock deadline, advanced only after it fires,
//! so a slow cycle never shifts later ticks and jobs due at the same instant
//! all run. Each poll runs on its own task; if the previous cycle is still in
//! flight when the next tick fires, both run and the store serializes their
//! appends per currency.

use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Local, NaiveTime, TimeDelta, TimeZone, Timelike, Utc};
use tokio::task::JoinSet;

use crate::backup::{BackupTarget, BackupTrigger};
use crate::clock::{Clock, SystemClock};
use crate::ingest::IngestContext;

/// First instant strictly after `after` whose second-of-minute is `second`.
pub fn next_poll_tick(after: DateTime<Utc>, second: u32) -> DateTime<Utc> {
    let second = second.min(59);
    let minute_start = after
        - TimeDelta::seconds(i64::from(after.second()))
        - TimeDelta::nanoseconds(i64::from(after.nanosecond()));
    let candidate = minute_start + TimeDelta::seconds(i64::from(second));
    if candidate > after {
        candidate
    } else {
        candidate + TimeDelta::minutes(1)
    }
}

/// First midnight in `tz` strictly after `after`.
///
/// When a DST transition skips midnight, the first valid local time of that
/// day is used instead.
pub fn next_midnight<Tz: TimeZone>(after: DateTime<Utc>, tz: &Tz) -> DateTime<Utc> {
    let local_date = after.with_timezone(tz).date_naive();
    let Some(next_date) = local_date.succ_opt() else {
        return after + TimeDelta::days(1);
    };

    for hour in 0..3 {
        let time = NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or(NaiveTime::MIN);
        if let Some(at) = tz.from_local_datetime(&next_date.and_time(time)).earliest() {
            return at.with_timezone(&Utc);
        }
    }
    after + TimeDelta::days(1)
}

enum Job {
    Poll(DateTime<Utc>),
    Backup,
    Shutdown,
}

pub struct Scheduler {
    ingest: Arc<IngestContext>,
    backup: Option<(Arc<dyn BackupTrigger>, BackupTarget)>,
    clock: Arc<dyn Clock>,
    poll_second: u32,
}

impl Scheduler {
    pub fn new(ingest: Arc<IngestContext>) -> Self {
        Self {
            ingest,
            backup: None,
            clock: Arc::new(SystemClock),
            poll_second: 0,
        }
    }

    pub fn with_backup(mut self, trigger: Arc<dyn BackupTrigger>, target: BackupTarget) -> Self {
        self.backup = Some((trigger, target));
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_poll_second(mut self, second: u32) -> Self {
        self.poll_second = second.min(59);
        self
    }

    fn until(&self, at: DateTime<Utc>) -> std::time::Duration {
        (at - self.clock.now()).to_std().unwrap_or_default()
    }

    /// Run until `shutdown` resolves, then wait for in-flight poll cycles.
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> Result<()> {
        tokio::pin!(shutdown);
        let mut cycles: JoinSet<()> = JoinSet::new();

        tracing::info!(
            poll_second = self.poll_second,
            backup = self.backup.is_some(),
            "Scheduler started"
        );

        let now = self.clock.now();
        let mut poll_at = next_poll_tick(now, self.poll_second);
        let mut backup_at = next_midnight(now, &Local);

        loop {
            let job = tokio::select! {
                _ = &mut shutdown => Job::Shutdown,
                _ = tokio::time::sleep(self.until(poll_at)) => Job::Poll(poll_at),
                _ = tokio::time::sleep(self.until(backup_at)), if self.backup.is_some() => Job::Backup,
            };

            while let Some(finished) = cycles.try_join_next() {
                if let Err(err) = finished {
                    tracing::warn!(error = %err, "Poll cycle task aborted");
                }
            }

            match job {
                Job::Poll(tick) => {
                    poll_at = next_poll_tick(tick.max(self.clock.now()), self.poll_second);
                    if !cycles.is_empty() {
                        tracing::warn!(
                            in_flight = cycles.len(),
                            tick = %tick,
                            "Previous poll cycle still running; starting another"
                        );
                    }
                    let ingest = self.ingest.clone();
                    cycles.spawn(async move {
                        if let Err(err) = ingest.run_cycle(tick).await {
                            tracing::warn!(tick = %tick, error = %format!("{err:#}"), "Poll cycle failed");
                        }
                    });
                }
                Job::Backup => {
                    backup_at = next_midnight(backup_at.max(self.clock.now()), &Local);
                    if let Some((trigger, target)) = &self.backup {
                        let trigger = trigger.clone();
                        let target = target.clone();
                        tokio::spawn(async move {
                            if let Err(err) = trigger.backup(&target).await {
                                tracing::warn!(error = %format!("{err:#}"), "Backup failed");
                            }
                        });
                    }
                }
                Job::Shutdown => break,
            }
        }

        tracing::info!(in_flight = cycles.len(), "Scheduler stopping");
        while let Some(finished) = cycles.join_next().await {
            if let Err(err) = finished {
                tracing::warn!(error = %err, "Poll cycle task aborted");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::FixedOffset;

    use super::*;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn test_next_poll_tick_is_aligned_to_minute() {
        assert_eq!(
            next_poll_tick(utc(2024, 1, 1, 10, 15, 42), 0),
            utc(2024, 1, 1, 10, 16, 0)
        );
        let just_after = utc(2024, 1, 1, 10, 15, 0) + TimeDelta::milliseconds(3);
        assert_eq!(next_poll_tick(just_after, 0), utc(2024, 1, 1, 10, 16, 0));
    }

    #[test]
    fn test_next_poll_tick_is_strictly_after() {
        assert_eq!(
            next_poll_tick(utc(2024, 1, 1, 10, 16, 0), 0),
            utc(2024, 1, 1, 10, 17, 0)
        );
        assert_eq!(
            next_poll_tick(utc(2024, 1, 1, 23, 59, 30), 0),
            utc(2024, 1, 2, 0, 0, 0)
        );
    }

    #[test]
    fn test_next_poll_tick_with_offset_second() {
        assert_eq!(
            next_poll_tick(utc(2024, 1, 1, 10, 15, 5), 30),
            utc(2024, 1, 1, 10, 15, 30)
        );
        assert_eq!(
            next_poll_tick(utc(2024, 1, 1, 10, 15, 45), 30),
            utc(2024, 1, 1, 10, 16, 30)
        );
    }

    #[test]
    fn test_next_midnight_in_utc() {
        assert_eq!(
            next_midnight(utc(2024, 2, 28, 13, 0, 0), &Utc),
            utc(2024, 2, 29, 0, 0, 0)
        );
        assert_eq!(
            next_midnight(utc(2024, 2, 29, 0, 0, 0), &Utc),
            utc(2024, 3, 1, 0, 0, 0)
        );
    }

    #[test]
    fn test_next_midnight_respects_local_offset() {
        let toronto_winter = FixedOffset::west_opt(5 * 3600).unwrap();
        // 03:00 UTC on Jan 10 is 22:00 local on Jan 9.
        assert_eq!(
            next_midnight(utc(2024, 1, 10, 3, 0, 0), &toronto_winter),
            utc(2024, 1, 10, 5, 0, 0)
        );
    }
}
