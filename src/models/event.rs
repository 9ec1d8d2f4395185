use serde::Serialize;
use std::collections::{HashMap, HashSet};

use crate::error::{BookingError, BookingResult};
use crate::models::{InventoryCounters, SeatLine, SeatRecord, SeatSpec, SeatStatus};

/// Карта мест одного события. Единственный писатель статусов мест.
///
/// Каждая мутация заканчивается `recount()`, поэтому
/// `total == available + reserved + booked` выполняется всегда.
#[derive(Debug, Clone)]
pub struct EventSeating {
    event_id: String,
    currency: String,
    seats: Vec<SeatRecord>,
    index: HashMap<String, usize>,
    counters: InventoryCounters,
}

/// Снимок карты мест для чтения.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatMap {
    pub event_id: String,
    pub currency: String,
    pub counters: InventoryCounters,
    pub seats: Vec<SeatRecord>,
}

/// Проверяет запрос на захват/освобождение: непустой, без повторов.
pub fn check_seat_request(seat_numbers: &[String]) -> BookingResult<()> {
    if seat_numbers.is_empty() {
        return Err(BookingError::invalid_request("at least one seat must be requested"));
    }
    let mut seen = HashSet::new();
    for seat in seat_numbers {
        if !seen.insert(seat.as_str()) {
            return Err(BookingError::invalid_request(format!("seat {seat} requested twice")));
        }
    }
    Ok(())
}

impl EventSeating {
    /// Публикация события: по одной записи на каждое физическое место, все `available`.
    pub fn publish(
        event_id: impl Into<String>,
        currency: impl Into<String>,
        specs: Vec<SeatSpec>,
    ) -> BookingResult<Self> {
        let event_id = event_id.into();
        if event_id.trim().is_empty() {
            return Err(BookingError::invalid_request("event id must not be empty"));
        }
        if specs.is_empty() {
            return Err(BookingError::invalid_request("event must have at least one seat"));
        }

        let mut index = HashMap::with_capacity(specs.len());
        let mut seats = Vec::with_capacity(specs.len());
        for spec in specs {
            if spec.seat_number.trim().is_empty() {
                return Err(BookingError::invalid_request("seat number must not be empty"));
            }
            if !spec.price.is_finite() || spec.price < 0.0 {
                return Err(BookingError::invalid_request(format!(
                    "seat {} has invalid price {}",
                    spec.seat_number, spec.price
                )));
            }
            if index.insert(spec.seat_number.clone(), seats.len()).is_some() {
                return Err(BookingError::invalid_request(format!(
                    "duplicate seat number {}",
                    spec.seat_number
                )));
            }
            seats.push(SeatRecord::from(spec));
        }

        let mut seating = Self {
            event_id,
            currency: currency.into(),
            seats,
            index,
            counters: InventoryCounters::default(),
        };
        seating.recount();
        Ok(seating)
    }

    /// Восстановление из хранилища (статусы уже заданы).
    pub fn from_records(
        event_id: impl Into<String>,
        currency: impl Into<String>,
        seats: Vec<SeatRecord>,
    ) -> Self {
        let index = seats
            .iter()
            .enumerate()
            .map(|(i, s)| (s.seat_number.clone(), i))
            .collect();
        let mut seating = Self {
            event_id: event_id.into(),
            currency: currency.into(),
            seats,
            index,
            counters: InventoryCounters::default(),
        };
        seating.recount();
        seating
    }

    pub fn event_id(&self) -> &str {
        &self.event_id
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn counters(&self) -> InventoryCounters {
        self.counters
    }

    pub fn seats(&self) -> &[SeatRecord] {
        &self.seats
    }

    pub fn seat(&self, seat_number: &str) -> Option<&SeatRecord> {
        self.index.get(seat_number).map(|&i| &self.seats[i])
    }

    pub fn snapshot(&self) -> SeatMap {
        SeatMap {
            event_id: self.event_id.clone(),
            currency: self.currency.clone(),
            counters: self.counters,
            seats: self.seats.clone(),
        }
    }

    /// Все или ничего: если хоть одно место занято (или не существует),
    /// ничего не меняется и возвращается полный список проблемных мест.
    pub fn claim(&mut self, seat_numbers: &[String], holder: &str) -> BookingResult<Vec<SeatLine>> {
        check_seat_request(seat_numbers)?;

        let taken: Vec<String> = seat_numbers
            .iter()
            .filter(|n| {
                self.seat(n)
                    .map(|seat| seat.status != SeatStatus::Available)
                    .unwrap_or(true)
            })
            .cloned()
            .collect();
        if !taken.is_empty() {
            return Err(BookingError::SeatUnavailable {
                event_id: self.event_id.clone(),
                seats: taken,
            });
        }

        let mut lines = Vec::with_capacity(seat_numbers.len());
        for number in seat_numbers {
            let seat = &mut self.seats[self.index[number.as_str()]];
            seat.status = SeatStatus::Reserved;
            seat.holder = Some(holder.to_string());
            lines.push(SeatLine {
                seat_number: seat.seat_number.clone(),
                price: seat.price,
            });
        }
        self.recount();
        Ok(lines)
    }

    /// `reserved -> booked` для мест, удерживаемых `holder`. Возвращает переведённые места.
    pub fn commit(&mut self, seat_numbers: &[String], holder: &str) -> Vec<String> {
        let mut committed = Vec::new();
        for number in seat_numbers {
            let Some(&i) = self.index.get(number.as_str()) else { continue };
            let seat = &mut self.seats[i];
            if seat.status == SeatStatus::Reserved && seat.holder.as_deref() == Some(holder) {
                seat.status = SeatStatus::Booked;
                committed.push(number.clone());
            }
        }
        self.recount();
        committed
    }

    /// Идемпотентно: свободное место пропускается. С `holder` освобождаются
    /// только места этой брони.
    pub fn release(&mut self, seat_numbers: &[String], holder: Option<&str>) -> Vec<String> {
        let mut released = Vec::new();
        for number in seat_numbers {
            let Some(&i) = self.index.get(number.as_str()) else { continue };
            let seat = &mut self.seats[i];
            if !seat.status.is_held() {
                continue;
            }
            if let Some(holder) = holder {
                if seat.holder.as_deref() != Some(holder) {
                    continue;
                }
            }
            seat.status = SeatStatus::Available;
            seat.holder = None;
            released.push(number.clone());
        }
        self.recount();
        released
    }

    fn recount(&mut self) {
        self.counters = InventoryCounters::tally(self.seats.iter().map(|s| &s.status));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn seating(n: usize) -> EventSeating {
        let specs = (1..=n)
            .map(|i| SeatSpec::new(format!("A{i}"), "A", "Parterre", 50.0 + i as f64))
            .collect();
        EventSeating::publish("E", "USD", specs).unwrap()
    }

    fn seats(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn publish_starts_fully_available() {
        let s = seating(3);
        assert_eq!(
            s.counters(),
            InventoryCounters { total_seats: 3, available_seats: 3, reserved_seats: 0, booked_seats: 0 }
        );
    }

    #[test]
    fn publish_rejects_duplicate_seats() {
        let specs = vec![SeatSpec::new("A1", "A", "S", 10.0), SeatSpec::new("A1", "A", "S", 10.0)];
        assert!(matches!(
            EventSeating::publish("E", "USD", specs),
            Err(BookingError::InvalidRequest(_))
        ));
    }

    #[test]
    fn claim_is_all_or_nothing() {
        let mut s = seating(2);
        s.claim(&seats(&["A1"]), "b1").unwrap();

        let err = s.claim(&seats(&["A1", "A2"]), "b2").unwrap_err();
        match err {
            BookingError::SeatUnavailable { seats, .. } => assert_eq!(seats, vec!["A1".to_string()]),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(s.seat("A2").unwrap().status, SeatStatus::Available);
        assert_eq!(s.counters().reserved_seats, 1);
    }

    #[test]
    fn claim_returns_prices() {
        let mut s = seating(2);
        let lines = s.claim(&seats(&["A2", "A1"]), "b1").unwrap();
        assert_eq!(lines[0].seat_number, "A2");
        assert_eq!(lines[0].price, 52.0);
        assert_eq!(lines[1].price, 51.0);
    }

    #[test]
    fn unknown_seat_is_unavailable() {
        let mut s = seating(1);
        let err = s.claim(&seats(&["Z9"]), "b1").unwrap_err();
        assert!(matches!(err, BookingError::SeatUnavailable { ref seats, .. } if seats == &["Z9".to_string()]));
    }

    #[test]
    fn duplicate_request_is_rejected() {
        let mut s = seating(2);
        assert!(matches!(
            s.claim(&seats(&["A1", "A1"]), "b1"),
            Err(BookingError::InvalidRequest(_))
        ));
        assert_eq!(s.counters().available_seats, 2);
    }

    #[test]
    fn release_of_available_seat_is_noop() {
        let mut s = seating(1);
        let before = s.counters();
        assert!(s.release(&seats(&["A1"]), None).is_empty());
        assert_eq!(s.counters(), before);
    }

    #[test]
    fn release_respects_holder() {
        let mut s = seating(1);
        s.claim(&seats(&["A1"]), "b1").unwrap();
        assert!(s.release(&seats(&["A1"]), Some("b2")).is_empty());
        assert_eq!(s.release(&seats(&["A1"]), Some("b1")), seats(&["A1"]));
        assert_eq!(s.seat("A1").unwrap().holder, None);
    }

    #[test]
    fn commit_moves_reserved_to_booked() {
        let mut s = seating(2);
        s.claim(&seats(&["A1", "A2"]), "b1").unwrap();
        assert_eq!(s.commit(&seats(&["A1", "A2"]), "b1").len(), 2);
        assert_eq!(s.counters().booked_seats, 2);
        assert_eq!(s.counters().reserved_seats, 0);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Claim(Vec<usize>, usize),
        Commit(Vec<usize>, usize),
        Release(Vec<usize>, Option<usize>),
    }

    fn op() -> impl Strategy<Value = Op> {
        let picks = prop::collection::vec(0usize..8, 1..4);
        prop_oneof![
            (picks.clone(), 0usize..3).prop_map(|(p, h)| Op::Claim(p, h)),
            (picks.clone(), 0usize..3).prop_map(|(p, h)| Op::Commit(p, h)),
            (picks, prop::option::of(0usize..3)).prop_map(|(p, h)| Op::Release(p, h)),
        ]
    }

    proptest! {
        #[test]
        fn counters_always_match_seat_statuses(ops in prop::collection::vec(op(), 1..40)) {
            let mut s = seating(8);
            for op in ops {
                match op {
                    Op::Claim(p, h) => {
                        let mut names: Vec<String> = p.iter().map(|i| format!("A{}", i + 1)).collect();
                        names.dedup();
                        let before: Vec<SeatStatus> = s.seats().iter().map(|x| x.status).collect();
                        if s.claim(&names, &format!("b{h}")).is_err() {
                            let after: Vec<SeatStatus> = s.seats().iter().map(|x| x.status).collect();
                            prop_assert_eq!(before, after);
                        }
                    }
                    Op::Commit(p, h) => {
                        let names: Vec<String> = p.iter().map(|i| format!("A{}", i + 1)).collect();
                        s.commit(&names, &format!("b{h}"));
                    }
                    Op::Release(p, h) => {
                        let names: Vec<String> = p.iter().map(|i| format!("A{}", i + 1)).collect();
                        let holder = h.map(|h| format!("b{h}"));
                        s.release(&names, holder.as_deref());
                    }
                }
                let c = s.counters();
                prop_assert!(c.is_consistent());
                prop_assert_eq!(c, InventoryCounters::tally(s.seats().iter().map(|x| &x.status)));
                for seat in s.seats() {
                    prop_assert_eq!(seat.status.is_held(), seat.holder.is_some());
                }
            }
        }
    }
}
