use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use tracing::{info, warn};

use crate::db::models::{BookableService, OperatingHour};
use crate::db::repository::Repository;
use crate::utils::error::BookingError;

/// Step each operating window on each date in `[from, to]` by the service
/// duration, keeping slots that fit entirely inside the window. All wall
/// times are taken as UTC.
pub fn plan_slots(
    duration_minutes: i32,
    operating_hours: &[OperatingHour],
    from: NaiveDate,
    to: NaiveDate,
) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
    let duration = Duration::minutes(i64::from(duration_minutes));
    if duration <= Duration::zero() {
        return Vec::new();
    }

    let mut slots = Vec::new();
    let mut date = from;
    while date <= to {
        let weekday = date.weekday().num_days_from_sunday() as i16;
        for window in operating_hours.iter().filter(|h| h.day_of_week == weekday) {
            let open = date.and_time(window.open_time).and_utc();
            let close = date.and_time(window.close_time).and_utc();

            let mut start = open;
            while start + duration <= close {
                slots.push((start, start + duration));
                start += duration;
            }
        }
        date += Duration::days(1);
    }

    slots
}

/// Slot inventory maintenance: forward generation from operating hours
/// and closing windows that have passed.
pub struct InventoryLedger {
    repo: Arc<Repository>,
}

impl InventoryLedger {
    pub fn new(repo: Arc<Repository>) -> Self {
        Self { repo }
    }

    /// Extend the slot horizon for one service out to its booking window.
    /// Generation resumes the day after the last existing slot so reruns
    /// never duplicate. Returns the number of slots inserted.
    pub async fn generate_slots_for_service(
        &self,
        service: &BookableService,
    ) -> Result<u64, BookingError> {
        let hours = self.repo.operating_hours(service.id).await?;
        if hours.is_empty() {
            warn!(service_id = service.id, "Service has no operating hours, skipping");
            return Ok(0);
        }

        let today = Utc::now().date_naive();
        let from = match self.repo.last_slot_start(service.id).await? {
            Some(last) => (last.date_naive() + Duration::days(1)).max(today),
            None => today,
        };
        let to = today + Duration::days(i64::from(service.booking_window_max_days));
        if from > to {
            return Ok(0);
        }

        let planned = plan_slots(service.duration_minutes, &hours, from, to);
        if planned.is_empty() {
            return Ok(0);
        }

        let inserted = self
            .repo
            .insert_slots(service.tenant_id, service.id, service.default_capacity, &planned)
            .await?;

        info!(service_id = service.id, inserted, %from, %to, "Generated availability slots");
        Ok(inserted)
    }

    /// Run generation for every active service, or one by id.
    pub async fn generate_slots(&self, service_id: Option<i64>) -> Result<u64, BookingError> {
        let services = match service_id {
            Some(id) => {
                let service = self
                    .repo
                    .get_service(id)
                    .await?
                    .ok_or_else(|| BookingError::NotFound(format!("service {id}")))?;
                vec![service]
            }
            None => self.repo.list_active_services().await?,
        };

        let mut total = 0;
        for service in &services {
            total += self.generate_slots_for_service(service).await?;
        }
        Ok(total)
    }

    /// Flip open slots whose start time has passed to closed.
    pub async fn close_past_slots(&self) -> Result<u64, BookingError> {
        let closed = self.repo.close_past_slots(Utc::now()).await?;
        if closed > 0 {
            info!(closed, "Closed past availability slots");
        }
        Ok(closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn window(day: i16, open: &str, close: &str) -> OperatingHour {
        OperatingHour {
            id: 0,
            tenant_id: 1,
            bookable_service_id: 1,
            day_of_week: day,
            open_time: open.parse::<NaiveTime>().unwrap(),
            close_time: close.parse::<NaiveTime>().unwrap(),
        }
    }

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn slots_step_through_the_window_by_duration() {
        // 2026-09-07 is a Monday (day 1)
        let hours = [window(1, "09:00:00", "12:00:00")];
        let slots = plan_slots(60, &hours, date("2026-09-07"), date("2026-09-07"));

        assert_eq!(slots.len(), 3);
        assert_eq!(slots[0].0.to_rfc3339(), "2026-09-07T09:00:00+00:00");
        assert_eq!(slots[2].1.to_rfc3339(), "2026-09-07T12:00:00+00:00");
    }

    #[test]
    fn partial_slot_at_the_end_of_the_window_is_dropped() {
        let hours = [window(1, "09:00:00", "10:30:00")];
        let slots = plan_slots(60, &hours, date("2026-09-07"), date("2026-09-07"));
        assert_eq!(slots.len(), 1);
    }

    #[test]
    fn days_without_operating_hours_produce_nothing() {
        // Monday-only hours over a Mon..Wed range
        let hours = [window(1, "09:00:00", "11:00:00")];
        let slots = plan_slots(60, &hours, date("2026-09-07"), date("2026-09-09"));
        assert_eq!(slots.len(), 2);
        assert!(slots.iter().all(|(s, _)| s.date_naive() == date("2026-09-07")));
    }

    #[test]
    fn multiple_windows_on_one_day_are_all_filled() {
        let hours = [
            window(1, "09:00:00", "11:00:00"),
            window(1, "14:00:00", "16:00:00"),
        ];
        let slots = plan_slots(60, &hours, date("2026-09-07"), date("2026-09-07"));
        assert_eq!(slots.len(), 4);
    }

    #[test]
    fn weekday_indexing_is_sunday_zero_based() {
        // day 6 = Saturday; 2026-09-05 is a Saturday
        let hours = [window(6, "10:00:00", "11:00:00")];
        let slots = plan_slots(60, &hours, date("2026-09-04"), date("2026-09-06"));
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].0.date_naive(), date("2026-09-05"));
    }

    #[test]
    fn nonpositive_duration_yields_no_slots() {
        let hours = [window(1, "09:00:00", "17:00:00")];
        assert!(plan_slots(0, &hours, date("2026-09-07"), date("2026-09-07")).is_empty());
    }
}
