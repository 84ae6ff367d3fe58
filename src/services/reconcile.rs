// src/services/reconcile.rs

//! Date to record mapping.

use std::time::Duration;

use chrono::NaiveDate;

use crate::error::{AppError, Result};
use crate::models::AlmanaxRecord;
use crate::services::ReceiverResolver;
use crate::utils::{date_range, format_date, jitter_sleep};

/// Result of a mapping pass.
#[derive(Debug)]
pub struct Reconciliation {
    pub records: Vec<AlmanaxRecord>,
    /// Number of dates attached during this pass
    pub mapped_days: usize,
    /// True when the dataset already carried days and nothing was resolved
    pub already_mapped: bool,
}

/// Attaches every date of the mapping horizon to its record.
pub struct MappingReconciler {
    resolver: ReceiverResolver,
    horizon: chrono::Duration,
    jitter: (Duration, Duration),
}

impl MappingReconciler {
    pub fn new(
        resolver: ReceiverResolver,
        horizon: chrono::Duration,
        jitter: (Duration, Duration),
    ) -> Self {
        Self {
            resolver,
            horizon,
            jitter,
        }
    }

    /// Dates from `today` to `today + horizon`, both included.
    pub fn window(&self, today: NaiveDate) -> Result<Vec<String>> {
        let end = today
            .checked_add_signed(self.horizon)
            .ok_or_else(|| AppError::date(format!("{today} + {} is out of range", self.horizon)))?;
        date_range(&format_date(today), &format_date(end))
    }

    /// Map the horizon starting at `today` onto `records`.
    ///
    /// A dataset whose first record already has a day is returned untouched.
    /// Only the first record is inspected. Every resolved receiver must exist
    /// in the dataset; the first one that does not aborts the pass.
    pub async fn reconcile(
        &self,
        mut records: Vec<AlmanaxRecord>,
        today: NaiveDate,
    ) -> Result<Reconciliation> {
        if records.first().is_some_and(AlmanaxRecord::has_days) {
            log::info!("Dataset already mapped, skipping resolution");
            return Ok(Reconciliation {
                records,
                mapped_days: 0,
                already_mapped: true,
            });
        }

        let dates = self.window(today)?;
        log::info!(
            "Mapping {} days from={} to={}",
            dates.len(),
            dates.first().map(String::as_str).unwrap_or("-"),
            dates.last().map(String::as_str).unwrap_or("-")
        );

        let mut mapped_days = 0;
        for (i, date) in dates.iter().enumerate() {
            if i > 0 {
                jitter_sleep(self.jitter.0, self.jitter.1).await;
            }

            let receiver = self.resolver.resolve(date).await?;
            let Some(record) = records
                .iter_mut()
                .find(|record| record.offering_receiver == receiver)
            else {
                log::error!(
                    "Could not find offering receiver date={} receiver={:?}",
                    date,
                    receiver
                );
                return Err(AppError::UnmatchedReceiver {
                    date: date.clone(),
                    receiver,
                });
            };

            log::debug!("Mapped date={} receiver={}", date, receiver);
            record.days.push(date.clone());
            mapped_days += 1;
        }

        Ok(Reconciliation {
            records,
            mapped_days,
            already_mapped: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::services::receiver::PageFetch;
    use crate::services::receiver::tests::{ScriptedPages, page_for};

    fn record(name: &str) -> AlmanaxRecord {
        AlmanaxRecord {
            offering_receiver: name.into(),
            ..Default::default()
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    fn receivers(date: &str) -> PageFetch {
        let name = match date {
            "2024-06-01" => "Anicotil",
            "2024-06-02" => "Brumaire",
            "2024-06-03" => "Anicotil",
            _ => "Nobody",
        };
        PageFetch::Page(page_for(name))
    }

    fn reconciler(source: ScriptedPages, horizon: &str) -> MappingReconciler {
        let resolver = ReceiverResolver::new(Box::new(source), Duration::from_secs(60)).unwrap();
        MappingReconciler::new(
            resolver,
            crate::utils::parse_duration(horizon).unwrap(),
            (Duration::from_secs(1), Duration::from_secs(2)),
        )
    }

    #[test]
    fn test_window_is_inclusive() {
        let reconciler = reconciler(ScriptedPages::new(vec![], receivers), "2d");
        assert_eq!(
            reconciler.window(today()).unwrap(),
            vec!["2024-06-01", "2024-06-02", "2024-06-03"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_maps_each_date_once() {
        let source = ScriptedPages::new(vec![], receivers);
        let calls = Arc::clone(&source.calls);
        let reconciler = reconciler(source, "2d");

        let outcome = reconciler
            .reconcile(vec![record("Anicotil"), record("Brumaire"), record("Cerise")], today())
            .await
            .unwrap();

        assert!(!outcome.already_mapped);
        assert_eq!(outcome.mapped_days, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(outcome.records[0].days, vec!["2024-06-01", "2024-06-03"]);
        assert_eq!(outcome.records[1].days, vec!["2024-06-02"]);
        assert!(outcome.records[2].days.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_jitter_between_lookups() {
        let reconciler = reconciler(ScriptedPages::new(vec![], receivers), "2d");
        let start = tokio::time::Instant::now();
        reconciler
            .reconcile(vec![record("Anicotil"), record("Brumaire")], today())
            .await
            .unwrap();

        // Two pauses of 1-2 s for three dates
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(2));
        assert!(elapsed <= Duration::from_secs(4) + Duration::from_millis(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_already_mapped_skips_lookups() {
        let source = ScriptedPages::new(vec![], receivers);
        let calls = Arc::clone(&source.calls);
        let reconciler = reconciler(source, "1y");

        let mut first = record("Anicotil");
        first.days.push("2024-05-01".into());
        let input = vec![first, record("Brumaire")];

        let outcome = reconciler.reconcile(input.clone(), today()).await.unwrap();
        assert!(outcome.already_mapped);
        assert_eq!(outcome.records, input);

        let again = reconciler.reconcile(outcome.records, today()).await.unwrap();
        assert_eq!(again.records, input);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_record_empty_day_is_not_mapped() {
        let source = ScriptedPages::new(vec![], receivers);
        let calls = Arc::clone(&source.calls);
        let reconciler = reconciler(source, "0d");

        let mut first = record("Anicotil");
        first.days.push(String::new());

        let outcome = reconciler.reconcile(vec![first], today()).await.unwrap();
        assert!(!outcome.already_mapped);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(outcome.records[0].days, vec!["", "2024-06-01"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unmatched_receiver_aborts_before_next_date() {
        let source = ScriptedPages::new(vec![], receivers);
        let calls = Arc::clone(&source.calls);
        let reconciler = reconciler(source, "2d");

        // Brumaire (2024-06-02) is missing
        let err = reconciler
            .reconcile(vec![record("Anicotil")], today())
            .await
            .unwrap_err();

        match err {
            AppError::UnmatchedReceiver { date, receiver } => {
                assert_eq!(date, "2024-06-02");
                assert_eq!(receiver, "Brumaire");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_receiver_is_unmatched() {
        let source = ScriptedPages::new(vec![PageFetch::Page("<p>down for maintenance</p>".into())], receivers);
        let reconciler = reconciler(source, "0d");

        let err = reconciler
            .reconcile(vec![record("Anicotil")], today())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::UnmatchedReceiver { receiver, .. } if receiver.is_empty()));
    }
}
