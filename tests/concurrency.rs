mod common;

use chrono::{Duration, Utc};
use futures::future::join_all;

use booking_engine::models::{BookingStatus, SeatStatus};
use booking_engine::services::ExpiryService;
use booking_engine::BookingError;
use common::*;

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn single_seat_has_exactly_one_winner() {
    let h = harness();
    h.service.publish_event("E", "USD", row("A", 1, 99.0)).await.unwrap();

    let attempts = (0..64).map(|i| {
        let service = h.service.clone();
        tokio::spawn(async move { service.create_booking(request("E", &format!("U{i}"), &["A1"])).await })
    });
    let results: Vec<_> = join_all(attempts).await.into_iter().map(|r| r.unwrap()).collect();

    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1);
    for result in results.iter().filter(|r| r.is_err()) {
        match result {
            Err(BookingError::SeatUnavailable { seats, .. }) => assert_eq!(seats, &vec!["A1".to_string()]),
            other => panic!("loser must see SeatUnavailable, got {other:?}"),
        }
    }

    let counters = h.service.seat_map("E").await.unwrap().counters;
    assert_eq!(counters.reserved_seats, 1);
    assert_eq!(counters.available_seats, 0);
    assert!(counters.is_consistent());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn overlapping_claims_never_double_sell() {
    let h = harness();
    h.service.publish_event("E", "USD", row("A", 10, 10.0)).await.unwrap();

    // Окна по 3 места со сдвигом 1: соседние запросы пересекаются
    let attempts = (0..8).flat_map(|start| (0..4).map(move |k| (start, k))).map(|(start, k)| {
        let service = h.service.clone();
        tokio::spawn(async move {
            let seats: Vec<String> = (start + 1..=start + 3).map(|i| format!("A{i}")).collect();
            let names: Vec<&str> = seats.iter().map(String::as_str).collect();
            service
                .create_booking(request("E", &format!("U{start}-{k}"), &names))
                .await
        })
    });
    let results: Vec<_> = join_all(attempts).await.into_iter().map(|r| r.unwrap()).collect();
    let winners: Vec<_> = results.into_iter().filter_map(Result::ok).collect();
    assert!(!winners.is_empty());

    let mut claimed: Vec<String> = winners.iter().flat_map(|b| b.seat_numbers()).collect();
    let total = claimed.len();
    claimed.sort();
    claimed.dedup();
    assert_eq!(claimed.len(), total, "a seat was sold to two bookings");

    let map = h.service.seat_map("E").await.unwrap();
    assert_eq!(map.counters.reserved_seats as usize, total);
    for booking in &winners {
        for seat in booking.seat_numbers() {
            let record = map.seats.iter().find(|s| s.seat_number == seat).unwrap();
            assert_eq!(record.holder.as_deref(), Some(booking.booking_id.as_str()));
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn expiry_and_late_payment_have_one_winner() {
    for round in 0..20 {
        let h = harness();
        h.service.publish_event("E", "USD", row("A", 2, 10.0)).await.unwrap();
        let b = h.service.create_booking(request("E", "U1", &["A1", "A2"])).await.unwrap();

        let expire = {
            let service = h.service.clone();
            let id = b.booking_id.clone();
            tokio::spawn(async move { service.expire_booking(&id).await })
        };
        let confirm = {
            let service = h.service.clone();
            let id = b.booking_id.clone();
            tokio::spawn(async move { service.confirm_booking(&id, payment("tx-late")).await })
        };
        let (expired, confirmed) = (expire.await.unwrap(), confirm.await.unwrap());
        assert!(expired.is_ok() ^ confirmed.is_ok(), "round {round}: exactly one must win");

        let stored = h.service.get_booking(&b.booking_id).await.unwrap();
        let counters = h.service.seat_map("E").await.unwrap().counters;
        if confirmed.is_ok() {
            assert!(matches!(expired, Err(BookingError::InvalidTransition { .. })));
            assert_eq!(stored.status, BookingStatus::Confirmed);
            assert!(stored.token.is_some());
            assert_eq!(counters.booked_seats, 2);
        } else {
            assert!(matches!(
                confirmed,
                Err(BookingError::InvalidTransition { from: BookingStatus::Cancelled, .. })
            ));
            assert_eq!(stored.status, BookingStatus::Cancelled);
            assert_eq!(counters.available_seats, 2);
        }
        assert!(counters.is_consistent());
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn cancel_and_payment_race_leaves_seats_matching_status() {
    for round in 0..30 {
        let h = harness();
        h.service.publish_event("E", "USD", row("A", 3, 10.0)).await.unwrap();
        let b = h.service.create_booking(request("E", "U1", &["A1", "A2", "A3"])).await.unwrap();

        let cancel = {
            let service = h.service.clone();
            let id = b.booking_id.clone();
            tokio::spawn(async move { service.cancel_booking(&id, "changed plans").await })
        };
        let confirm = {
            let service = h.service.clone();
            let id = b.booking_id.clone();
            tokio::spawn(async move { service.confirm_booking(&id, payment("tx-race")).await })
        };
        let (cancelled, confirmed) = (cancel.await.unwrap(), confirm.await.unwrap());
        // Отмена допустима и из pending, и из confirmed: она всегда побеждает
        assert!(cancelled.is_ok(), "round {round}: {cancelled:?}");

        let stored = h.service.get_booking(&b.booking_id).await.unwrap();
        assert_eq!(stored.status, BookingStatus::Cancelled);
        assert!(stored.pending_effects.is_empty(), "round {round}: {:?}", stored.pending_effects);
        let eligible = stored.refund_details.unwrap().refund_eligible;
        match confirmed {
            // Оплата успела раньше отмены: фиксация мест не должна пережить release
            Ok(_) => assert!(eligible),
            Err(BookingError::InvalidTransition { from, .. }) => {
                assert_eq!(from, BookingStatus::Cancelled);
                assert!(!eligible);
            }
            Err(other) => panic!("round {round}: {other:?}"),
        }

        let map = h.service.seat_map("E").await.unwrap();
        assert!(map.counters.is_consistent());
        assert_eq!(map.counters.available_seats, 3);
        assert!(map
            .seats
            .iter()
            .all(|s| s.status == SeatStatus::Available && s.holder.is_none()));
    }
}

#[tokio::test]
async fn sweep_expires_only_stale_pending_bookings() {
    let h = harness();
    h.service.publish_event("E", "USD", row("A", 3, 10.0)).await.unwrap();
    let stale = h.service.create_booking(request("E", "U1", &["A1"])).await.unwrap();
    let paid = h.service.create_booking(request("E", "U2", &["A2"])).await.unwrap();
    h.service.confirm_booking(&paid.booking_id, payment("tx")).await.unwrap();

    let expiry = ExpiryService::new(h.service.clone());

    // Внутри hold window ничего не истекает
    let report = expiry.run_once(Utc::now()).await;
    assert_eq!(report.expired, 0);

    let later = Utc::now() + h.service.config().hold_window() + Duration::seconds(1);
    let report = expiry.run_once(later).await;
    assert_eq!(report.found, 1);
    assert_eq!(report.expired, 1);

    let expired = h.service.get_booking(&stale.booking_id).await.unwrap();
    assert_eq!(expired.status, BookingStatus::Cancelled);
    assert!(!expired.refund_details.unwrap().refund_eligible);
    assert_eq!(
        h.service.get_booking(&paid.booking_id).await.unwrap().status,
        BookingStatus::Confirmed
    );

    let map = h.service.seat_map("E").await.unwrap();
    let a1 = map.seats.iter().find(|s| s.seat_number == "A1").unwrap();
    assert_eq!(a1.status, SeatStatus::Available);

    // Повторный проход - брони уже не pending
    let report = expiry.run_once(later).await;
    assert_eq!(report.found, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_cancels_release_once() {
    let h = harness();
    h.service.publish_event("E", "USD", row("A", 1, 10.0)).await.unwrap();
    let b = h.service.create_booking(request("E", "U1", &["A1"])).await.unwrap();

    let cancels = (0..8).map(|_| {
        let service = h.service.clone();
        let id = b.booking_id.clone();
        tokio::spawn(async move { service.cancel_booking(&id, "dup click").await })
    });
    let results: Vec<_> = join_all(cancels).await.into_iter().map(|r| r.unwrap()).collect();
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);

    let next = h.service.create_booking(request("E", "U2", &["A1"])).await.unwrap();
    // Поздний повтор отмены не может освободить место новой брони
    let _ = h.service.cancel_booking(&b.booking_id, "late dup").await;
    let map = h.service.seat_map("E").await.unwrap();
    assert_eq!(map.seats[0].holder.as_deref(), Some(next.booking_id.as_str()));
}
