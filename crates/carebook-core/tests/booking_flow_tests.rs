//! End-to-end booking flow: request → payment → accept → front desk →
//! completion → escrow release, with controlled clocks.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use carebook_core::db::Database;
use carebook_core::escrow::EscrowLedger;
use carebook_core::events::MemorySink;
use carebook_core::lifecycle::{BookingLifecycle, BookingRequest};
use carebook_core::models::{
    Actor, BookingStatus, EscrowState, Role, SessionSlot, TrackingStatus,
};
use carebook_core::payment::{PaymentRequest, RecordingGateway};
use carebook_core::tracking::AppointmentTracker;
use carebook_core::{
    open_platform_in_memory, AnalyticsFilter, NullGateway, PlatformError, ReportWindow,
};
use std::sync::Arc;

fn at(s: &str) -> DateTime<Utc> {
    s.parse().unwrap()
}

struct Clinic {
    db: Database,
    sink: MemorySink,
    gateway: RecordingGateway,
    therapist_id: Uuid,
    patient_id: Uuid,
}

impl Clinic {
    fn new() -> Self {
        let db = Database::open_in_memory().unwrap();
        let therapist =
            carebook_core::models::Therapist::new("Dr. Ferrante".into(), at("2026-03-01T00:00:00Z"));
        db.insert_therapist(&therapist).unwrap();
        Self {
            db,
            sink: MemorySink::new(),
            gateway: RecordingGateway::new(),
            therapist_id: therapist.id,
            patient_id: Uuid::new_v4(),
        }
    }

    fn lifecycle(&self) -> BookingLifecycle<'_> {
        BookingLifecycle::new(&self.db, &self.sink, &self.gateway)
    }

    fn request(&self) -> BookingRequest {
        BookingRequest {
            patient_id: self.patient_id,
            therapist_id: self.therapist_id,
            organization_id: None,
            session_type_id: Uuid::new_v4(),
            subtotal: 10_000,
            slot: SessionSlot {
                start_at: at("2026-03-02T09:00:00Z"),
                end_at: at("2026-03-02T10:00:00Z"),
            },
        }
    }
}

#[test]
fn test_full_day_in_the_life() {
    let clinic = Clinic::new();
    let lifecycle = clinic.lifecycle();
    let tracker = AppointmentTracker::new(&clinic.db);
    let ledger = EscrowLedger::new(&clinic.db, &clinic.sink);
    let therapist = Actor::new(clinic.therapist_id, Role::Therapist);

    // Day before: booked, paid, accepted
    let booking = lifecycle
        .request_booking(clinic.request(), at("2026-03-01T10:00:00Z"))
        .unwrap();
    lifecycle
        .confirm_payment(booking.id, at("2026-03-01T10:01:00Z"))
        .unwrap();
    let booking_id = booking.id;
    let confirmed = lifecycle
        .accept(booking_id, &therapist, at("2026-03-01T11:00:00Z"))
        .unwrap();
    assert_eq!(confirmed.status, BookingStatus::Confirmed);
    assert_eq!(confirmed.split.unwrap().total(), 10_000);

    // Lifecycle completion is blocked until the session actually happens
    let early = lifecycle.complete(booking_id, at("2026-03-01T12:00:00Z"));
    assert!(matches!(early, Err(PlatformError::InvalidTransition(_))));

    // Day of: check-in 9:05, start 9:07, finish 10:00
    tracker.check_in(booking_id, at("2026-03-02T09:05:00Z")).unwrap();
    tracker
        .start_session(booking_id, at("2026-03-02T09:07:00Z"))
        .unwrap();
    let tracked = tracker
        .complete_session(booking_id, at("2026-03-02T10:00:00Z"))
        .unwrap();
    assert_eq!(tracked.tracking_status, TrackingStatus::Completed);
    assert_eq!(tracked.session_duration(), Some(Duration::minutes(53)));

    // Now the lifecycle may close; the escrow countdown starts (72h default)
    let completed = lifecycle
        .complete(booking_id, at("2026-03-02T10:00:00Z"))
        .unwrap();
    assert_eq!(completed.status, BookingStatus::Completed);

    let hold = ledger.get_hold(booking_id).unwrap();
    assert_eq!(hold.state, EscrowState::Held);
    assert_eq!(hold.release_eligible_at, Some(at("2026-03-05T10:00:00Z")));

    // Sweeps before eligibility never promote, however often they run
    for hour in [12, 20] {
        let now = at(&format!("2026-03-04T{:02}:00:00Z", hour));
        let outcome = ledger.sweep_release(now).unwrap();
        assert_eq!(outcome.promoted, 0);
    }

    // At eligibility the hold promotes, then pays out
    let outcome = ledger.sweep_release(at("2026-03-05T10:00:00Z")).unwrap();
    assert_eq!(outcome.promoted, 1);
    let hold = ledger.release(booking_id, at("2026-03-05T10:05:00Z")).unwrap();
    assert_eq!(hold.state, EscrowState::Released);

    assert_eq!(
        clinic.sink.names(),
        vec![
            "booking.confirmed",
            "booking.completed",
            "escrow.released",
        ]
    );
    assert_eq!(
        clinic.gateway.requests(),
        vec![PaymentRequest::Capture {
            booking_id,
            amount: 10_000
        }]
    );
}

#[test]
fn test_settings_snapshot_shields_existing_bookings() {
    let clinic = Clinic::new();
    let lifecycle = clinic.lifecycle();
    let therapist = Actor::new(clinic.therapist_id, Role::Therapist);

    let booking = lifecycle
        .request_booking(clinic.request(), at("2026-03-01T10:00:00Z"))
        .unwrap();
    lifecycle
        .confirm_payment(booking.id, at("2026-03-01T10:01:00Z"))
        .unwrap();
    let confirmed = lifecycle
        .accept(booking.id, &therapist, at("2026-03-01T11:00:00Z"))
        .unwrap();
    assert_eq!(confirmed.split.unwrap().commission_percentage, 15);

    // Admin raises the commission and shortens the hold window afterwards
    clinic
        .db
        .insert_settings(30, 24, Uuid::new_v4(), at("2026-03-01T12:00:00Z"))
        .unwrap();

    // The booking keeps its 15% snapshot and its 72h hold window
    let unchanged = clinic.db.get_booking(booking.id).unwrap().unwrap();
    assert_eq!(unchanged.split.unwrap().commission_percentage, 15);
    let hold = clinic.db.get_hold(booking.id).unwrap().unwrap();
    assert_eq!(hold.hold_hours, 72);

    // A booking confirmed after the change uses the new settings
    let mut request = clinic.request();
    request.slot = SessionSlot {
        start_at: at("2026-03-03T09:00:00Z"),
        end_at: at("2026-03-03T10:00:00Z"),
    };
    let second = lifecycle
        .request_booking(request, at("2026-03-01T13:00:00Z"))
        .unwrap();
    lifecycle
        .confirm_payment(second.id, at("2026-03-01T13:01:00Z"))
        .unwrap();
    let second = lifecycle
        .accept(second.id, &therapist, at("2026-03-01T14:00:00Z"))
        .unwrap();
    assert_eq!(second.split.unwrap().commission_percentage, 30);
    let hold = clinic.db.get_hold(second.id).unwrap().unwrap();
    assert_eq!(hold.hold_hours, 24);
}

#[test]
fn test_no_show_booking_cannot_complete() {
    let clinic = Clinic::new();
    let lifecycle = clinic.lifecycle();
    let tracker = AppointmentTracker::new(&clinic.db);
    let therapist = Actor::new(clinic.therapist_id, Role::Therapist);

    let booking = lifecycle
        .request_booking(clinic.request(), at("2026-03-01T10:00:00Z"))
        .unwrap();
    lifecycle
        .confirm_payment(booking.id, at("2026-03-01T10:01:00Z"))
        .unwrap();
    lifecycle
        .accept(booking.id, &therapist, at("2026-03-01T11:00:00Z"))
        .unwrap();

    tracker
        .mark_no_show(booking.id, at("2026-03-02T09:40:00Z"))
        .unwrap();

    // A no-show never reaches lifecycle completion
    let result = lifecycle.complete(booking.id, at("2026-03-02T10:00:00Z"));
    assert!(matches!(result, Err(PlatformError::InvalidTransition(_))));

    // The therapist cancels the booking instead; escrow is refunded
    let cancelled = lifecycle
        .cancel(booking.id, &therapist, at("2026-03-02T10:05:00Z"))
        .unwrap();
    assert_eq!(cancelled.status, BookingStatus::CancelledByTherapist);
    let hold = clinic.db.get_hold(booking.id).unwrap().unwrap();
    assert_eq!(hold.state, EscrowState::Refunded);
}

#[test]
fn test_facade_surface_round_trip() {
    let sink = Arc::new(MemorySink::new());
    let platform = open_platform_in_memory(sink.clone(), Arc::new(NullGateway)).unwrap();

    let therapist = platform.register_therapist("Dr. Ferrante".into()).unwrap();
    let organization = platform.register_organization("Lakeside Family Care".into()).unwrap();
    let owner = Actor::new(organization.id, Role::Organization);
    platform
        .propose_link(&owner, therapist.id, organization.id, 70, 30)
        .unwrap();
    platform
        .decide_link(&owner, therapist.id, organization.id, true)
        .unwrap();

    let start = Utc::now() + Duration::days(7);
    let booking = platform
        .request_booking(BookingRequest {
            patient_id: Uuid::new_v4(),
            therapist_id: therapist.id,
            organization_id: Some(organization.id),
            session_type_id: Uuid::new_v4(),
            subtotal: 20_000,
            slot: SessionSlot {
                start_at: start,
                end_at: start + Duration::hours(1),
            },
        })
        .unwrap();

    platform.confirm_payment(booking.id).unwrap();
    let actor = Actor::new(therapist.id, Role::Therapist);
    let confirmed = platform.accept_booking(booking.id, &actor).unwrap();

    // 15% of 20 000 = 3 000; remainder 17 000 at 70/30 = 11 900 / 5 100
    let split = confirmed.split.unwrap();
    assert_eq!(split.platform_fee, 3_000);
    assert_eq!(split.therapist_amount, 11_900);
    assert_eq!(split.organization_amount, 5_100);

    // Front desk drives the session through the facade
    platform.check_in(booking.id).unwrap();
    platform.start_session(booking.id).unwrap();
    platform.complete_session(booking.id).unwrap();
    let completed = platform.complete_booking(booking.id).unwrap();
    assert_eq!(completed.status, BookingStatus::Completed);

    // Schedule query sees the booking on its day
    let schedule = platform
        .schedule_for_date(start.date_naive(), Some(therapist.id))
        .unwrap();
    assert_eq!(schedule.len(), 1);
    assert_eq!(schedule[0].id, booking.id);

    // Analytics counts it once finalized
    let window = ReportWindow::new(start - Duration::days(1), start + Duration::days(1));
    let report = platform
        .revenue_report(window, AnalyticsFilter::default())
        .unwrap();
    assert_eq!(report.gross_value, 20_000);
    assert_eq!(report.completed_bookings, 1);
    assert_eq!(report.completion_rate, 1.0);

    let leaderboard = platform.organization_leaderboard(window, 5).unwrap();
    assert_eq!(leaderboard.len(), 1);
    assert_eq!(leaderboard[0].name, "Lakeside Family Care");
    assert_eq!(leaderboard[0].revenue, 5_100);

    assert_eq!(sink.names(), vec!["booking.confirmed", "booking.completed"]);
}
