//! Read-only analytics rollups over finalized bookings.
//!
//! Aggregation happens in memory over an explicit, enumerated filter: named
//! optional fields only, never an open-ended dictionary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::db::Database;
use crate::models::{Booking, BookingStatus};
use crate::PlatformResult;

/// Default leaderboard truncation.
pub const LEADERBOARD_TOP_N: usize = 10;

/// Enumerated analytics filter.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct AnalyticsFilter {
    pub therapist_id: Option<Uuid>,
    pub organization_id: Option<Uuid>,
    pub session_type_id: Option<Uuid>,
}

/// Half-open reporting window `[from, to)`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ReportWindow {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl ReportWindow {
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self { from, to }
    }

    /// The window of equal length immediately before this one, used for
    /// period-over-period growth.
    pub fn previous(&self) -> Self {
        let length = self.to - self.from;
        Self {
            from: self.from - length,
            to: self.from,
        }
    }
}

/// Revenue and volume rollup for one window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevenueReport {
    pub window: ReportWindow,
    /// Total subtotal across finalized bookings (GMV), before any split
    pub gross_value: i64,
    pub platform_revenue: i64,
    pub therapist_revenue: i64,
    pub organization_revenue: i64,
    pub total_bookings: usize,
    pub completed_bookings: usize,
    pub cancelled_bookings: usize,
    /// `completed / total`; 0 when the window is empty
    pub completion_rate: f64,
    /// `cancelled / total`; 0 when the window is empty
    pub cancellation_rate: f64,
    /// `(current - previous) / previous` on gross value; 0 when the previous
    /// window had none
    pub period_over_period_growth: f64,
}

/// One leaderboard row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LeaderboardEntry {
    pub id: Uuid,
    pub name: String,
    pub revenue: i64,
}

/// Read-only analytics aggregator.
pub struct AnalyticsAggregator<'a> {
    db: &'a Database,
}

impl<'a> AnalyticsAggregator<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    fn finalized(
        &self,
        window: &ReportWindow,
        filter: &AnalyticsFilter,
    ) -> PlatformResult<Vec<Booking>> {
        Ok(self.db.list_finalized_in_window(
            window.from,
            window.to,
            filter.therapist_id,
            filter.organization_id,
            filter.session_type_id,
        )?)
    }

    /// Full rollup for a window.
    pub fn revenue_report(
        &self,
        window: ReportWindow,
        filter: AnalyticsFilter,
    ) -> PlatformResult<RevenueReport> {
        let bookings = self.finalized(&window, &filter)?;
        let previous = self.finalized(&window.previous(), &filter)?;

        let gross_value: i64 = bookings.iter().map(|b| b.subtotal).sum();
        let previous_gross: i64 = previous.iter().map(|b| b.subtotal).sum();

        let mut platform_revenue = 0;
        let mut therapist_revenue = 0;
        let mut organization_revenue = 0;
        let mut completed_bookings = 0;
        let mut cancelled_bookings = 0;

        for booking in &bookings {
            match booking.status {
                BookingStatus::Completed => {
                    completed_bookings += 1;
                    if let Some(split) = &booking.split {
                        platform_revenue += split.platform_fee;
                        therapist_revenue += split.therapist_amount;
                        organization_revenue += split.organization_amount;
                    }
                }
                status if status.is_cancelled() => cancelled_bookings += 1,
                _ => {}
            }
        }

        let total_bookings = bookings.len();
        let rate = |count: usize| {
            if total_bookings == 0 {
                0.0
            } else {
                count as f64 / total_bookings as f64
            }
        };
        let period_over_period_growth = if previous_gross == 0 {
            0.0
        } else {
            (gross_value - previous_gross) as f64 / previous_gross as f64
        };

        Ok(RevenueReport {
            window,
            gross_value,
            platform_revenue,
            therapist_revenue,
            organization_revenue,
            total_bookings,
            completed_bookings,
            cancelled_bookings,
            completion_rate: rate(completed_bookings),
            cancellation_rate: rate(cancelled_bookings),
            period_over_period_growth,
        })
    }

    /// Therapists ranked by completed revenue: descending, ties broken by
    /// name ascending, truncated to `top_n`.
    pub fn therapist_leaderboard(
        &self,
        window: ReportWindow,
        top_n: usize,
    ) -> PlatformResult<Vec<LeaderboardEntry>> {
        let bookings = self.finalized(&window, &AnalyticsFilter::default())?;
        let names = self.db.therapist_names()?;

        let mut revenue_by_id: HashMap<Uuid, i64> = HashMap::new();
        for booking in &bookings {
            if booking.status != BookingStatus::Completed {
                continue;
            }
            if let Some(split) = &booking.split {
                *revenue_by_id.entry(booking.therapist_id).or_insert(0) +=
                    split.therapist_amount;
            }
        }

        Ok(rank(revenue_by_id, &names, top_n))
    }

    /// Organizations ranked by completed revenue, same ordering rules.
    pub fn organization_leaderboard(
        &self,
        window: ReportWindow,
        top_n: usize,
    ) -> PlatformResult<Vec<LeaderboardEntry>> {
        let bookings = self.finalized(&window, &AnalyticsFilter::default())?;
        let names = self.db.organization_names()?;

        let mut revenue_by_id: HashMap<Uuid, i64> = HashMap::new();
        for booking in &bookings {
            if booking.status != BookingStatus::Completed {
                continue;
            }
            let organization_id = match booking.organization_id {
                Some(id) => id,
                None => continue,
            };
            if let Some(split) = &booking.split {
                *revenue_by_id.entry(organization_id).or_insert(0) += split.organization_amount;
            }
        }

        Ok(rank(revenue_by_id, &names, top_n))
    }

    /// Consolidated schedule for the board: every booking starting in the
    /// window, whatever its state, ordered by start time.
    pub fn schedule(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        therapist_id: Option<Uuid>,
    ) -> PlatformResult<Vec<Booking>> {
        Ok(self.db.schedule_for_range(from, to, therapist_id)?)
    }
}

fn rank(
    revenue_by_id: HashMap<Uuid, i64>,
    names: &HashMap<Uuid, String>,
    top_n: usize,
) -> Vec<LeaderboardEntry> {
    let mut entries: Vec<LeaderboardEntry> = revenue_by_id
        .into_iter()
        .map(|(id, revenue)| LeaderboardEntry {
            id,
            name: names.get(&id).cloned().unwrap_or_else(|| id.to_string()),
            revenue,
        })
        .collect();
    entries.sort_by(|a, b| b.revenue.cmp(&a.revenue).then_with(|| a.name.cmp(&b.name)));
    entries.truncate(top_n);
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        Booking, EscrowHold, RevenueSplit, SessionSlot, Therapist, TrackingStatus,
    };

    struct Fixture {
        db: Database,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                db: Database::open_in_memory().unwrap(),
            }
        }

        fn add_therapist(&self, name: &str) -> Uuid {
            let therapist = Therapist::new(name.into(), Utc::now());
            self.db.insert_therapist(&therapist).unwrap();
            therapist.id
        }

        /// Insert a booking, confirm it with a 15% split, and drive it to the
        /// requested terminal status.
        fn finalized_booking(
            &self,
            therapist_id: Uuid,
            subtotal: i64,
            start: &str,
            status: BookingStatus,
        ) -> Uuid {
            let start_at: DateTime<Utc> = start.parse().unwrap();
            let now = start_at;
            let booking = Booking::new(
                Uuid::new_v4(),
                therapist_id,
                None,
                Uuid::new_v4(),
                subtotal,
                SessionSlot {
                    start_at,
                    end_at: start_at + chrono::Duration::hours(1),
                },
                now,
            );
            self.db.insert_booking(&booking).unwrap();
            self.db.mark_payment_confirmed(booking.id, now).unwrap();

            let split = crate::split::compute_split(subtotal, 15, None).unwrap();
            let hold = EscrowHold::open(booking.id, &split, 72, now);
            self.db.confirm_booking(booking.id, &split, &hold, now).unwrap();

            match status {
                BookingStatus::Completed => {
                    for (from, to) in [
                        (TrackingStatus::Scheduled, TrackingStatus::Waiting),
                        (TrackingStatus::Waiting, TrackingStatus::InSession),
                        (TrackingStatus::InSession, TrackingStatus::Completed),
                    ] {
                        self.db.update_tracking(booking.id, &from, &to, now).unwrap();
                    }
                    self.db.complete_booking(booking.id, now).unwrap();
                }
                other if other.is_cancelled() => {
                    self.db
                        .cancel_booking(booking.id, &BookingStatus::Confirmed, &other, now)
                        .unwrap();
                }
                _ => {}
            }
            booking.id
        }
    }

    fn march() -> ReportWindow {
        ReportWindow::new(
            "2026-03-01T00:00:00Z".parse().unwrap(),
            "2026-04-01T00:00:00Z".parse().unwrap(),
        )
    }

    #[test]
    fn test_revenue_report_rollup() {
        let fixture = Fixture::new();
        let therapist = fixture.add_therapist("Dr. Brook");

        fixture.finalized_booking(therapist, 10_000, "2026-03-02T09:00:00Z", BookingStatus::Completed);
        fixture.finalized_booking(therapist, 20_000, "2026-03-09T09:00:00Z", BookingStatus::Completed);
        fixture.finalized_booking(
            therapist,
            5_000,
            "2026-03-16T09:00:00Z",
            BookingStatus::CancelledByPatient,
        );

        let report = AnalyticsAggregator::new(&fixture.db)
            .revenue_report(march(), AnalyticsFilter::default())
            .unwrap();

        assert_eq!(report.gross_value, 35_000);
        assert_eq!(report.platform_revenue, 1_500 + 3_000);
        assert_eq!(report.therapist_revenue, 8_500 + 17_000);
        assert_eq!(report.organization_revenue, 0);
        assert_eq!(report.total_bookings, 3);
        assert_eq!(report.completed_bookings, 2);
        assert_eq!(report.cancelled_bookings, 1);
        assert!((report.completion_rate - 2.0 / 3.0).abs() < 1e-9);
        assert!((report.cancellation_rate - 1.0 / 3.0).abs() < 1e-9);
        // No February activity: growth defined as zero
        assert_eq!(report.period_over_period_growth, 0.0);
    }

    #[test]
    fn test_period_over_period_growth() {
        let fixture = Fixture::new();
        let therapist = fixture.add_therapist("Dr. Brook");

        // Previous window (February): 10 000 gross
        fixture.finalized_booking(therapist, 10_000, "2026-02-10T09:00:00Z", BookingStatus::Completed);
        // Current window (March): 15 000 gross
        fixture.finalized_booking(therapist, 15_000, "2026-03-10T09:00:00Z", BookingStatus::Completed);

        // Use a 28-day window aligned so the previous window covers February
        let window = ReportWindow::new(
            "2026-03-01T00:00:00Z".parse().unwrap(),
            "2026-03-29T00:00:00Z".parse().unwrap(),
        );
        let report = AnalyticsAggregator::new(&fixture.db)
            .revenue_report(window, AnalyticsFilter::default())
            .unwrap();

        assert!((report.period_over_period_growth - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_filter_by_therapist() {
        let fixture = Fixture::new();
        let first = fixture.add_therapist("Dr. Brook");
        let second = fixture.add_therapist("Dr. Chen");

        fixture.finalized_booking(first, 10_000, "2026-03-02T09:00:00Z", BookingStatus::Completed);
        fixture.finalized_booking(second, 20_000, "2026-03-02T11:00:00Z", BookingStatus::Completed);

        let filter = AnalyticsFilter {
            therapist_id: Some(first),
            ..Default::default()
        };
        let report = AnalyticsAggregator::new(&fixture.db)
            .revenue_report(march(), filter)
            .unwrap();
        assert_eq!(report.gross_value, 10_000);
        assert_eq!(report.total_bookings, 1);
    }

    #[test]
    fn test_leaderboard_ordering_and_truncation() {
        let fixture = Fixture::new();
        // Equal revenue: ties break by name ascending
        let zora = fixture.add_therapist("Dr. Zora");
        let abel = fixture.add_therapist("Dr. Abel");
        let mira = fixture.add_therapist("Dr. Mira");

        fixture.finalized_booking(zora, 10_000, "2026-03-02T09:00:00Z", BookingStatus::Completed);
        fixture.finalized_booking(abel, 10_000, "2026-03-03T09:00:00Z", BookingStatus::Completed);
        fixture.finalized_booking(mira, 30_000, "2026-03-04T09:00:00Z", BookingStatus::Completed);

        let board = AnalyticsAggregator::new(&fixture.db)
            .therapist_leaderboard(march(), LEADERBOARD_TOP_N)
            .unwrap();

        assert_eq!(board.len(), 3);
        assert_eq!(board[0].name, "Dr. Mira");
        assert_eq!(board[1].name, "Dr. Abel");
        assert_eq!(board[2].name, "Dr. Zora");

        let truncated = AnalyticsAggregator::new(&fixture.db)
            .therapist_leaderboard(march(), 2)
            .unwrap();
        assert_eq!(truncated.len(), 2);
    }

    #[test]
    fn test_schedule_ordering() {
        let fixture = Fixture::new();
        let therapist = fixture.add_therapist("Dr. Brook");

        fixture.finalized_booking(therapist, 10_000, "2026-03-02T14:00:00Z", BookingStatus::Confirmed);
        fixture.finalized_booking(therapist, 10_000, "2026-03-02T09:00:00Z", BookingStatus::Confirmed);

        let schedule = AnalyticsAggregator::new(&fixture.db)
            .schedule(
                "2026-03-02T00:00:00Z".parse().unwrap(),
                "2026-03-03T00:00:00Z".parse().unwrap(),
                Some(therapist),
            )
            .unwrap();
        assert_eq!(schedule.len(), 2);
        assert!(schedule[0].start_at < schedule[1].start_at);
    }
}
