//! Booking admission service
//!
//! Validates a booking request against room existence, date sanity,
//! capacity and overlapping reservations, computes the total price, and
//! persists a `pending` booking. The overlap re-check and the insert run
//! inside one room-locked transaction in the repository, so concurrent
//! requests for the same room cannot both pass the check.

use crate::database::booking_repository::{
    AdmissionOutcome, Booking, BookingRepository, BookingStatus, NewBooking,
};
use crate::database::room_repository::RoomRepository;
use crate::error::{AppError, AppResult, DomainError};
use crate::middleware::auth::AuthenticatedUser;
use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{info, warn};

/// Configuration for the admission service
#[derive(Debug, Clone)]
pub struct AdmissionConfig {
    /// Statuses that hold the dates against new admissions. Terminal
    /// non-blocking states (rejected, cancelled) never belong here.
    pub blocking_statuses: Vec<BookingStatus>,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            blocking_statuses: vec![BookingStatus::Pending, BookingStatus::Confirmed],
        }
    }
}

impl AdmissionConfig {
    pub fn from_env() -> Self {
        let raw = std::env::var("BOOKING_BLOCKING_STATUSES").unwrap_or_default();
        Self::from_status_list(&raw)
    }

    /// Parse a comma-separated status list; unknown entries are skipped
    /// with a warning and an empty result falls back to the default set.
    pub fn from_status_list(raw: &str) -> Self {
        let mut statuses = Vec::new();
        for entry in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            match entry.parse::<BookingStatus>() {
                Ok(status) if !statuses.contains(&status) => statuses.push(status),
                Ok(_) => {}
                Err(e) => warn!(entry = entry, "ignoring unknown blocking status: {}", e),
            }
        }
        if statuses.is_empty() {
            Self::default()
        } else {
            Self {
                blocking_statuses: statuses,
            }
        }
    }

    fn blocking_strings(&self) -> Vec<String> {
        self.blocking_statuses
            .iter()
            .map(|s| s.as_str().to_string())
            .collect()
    }
}

/// A submitted booking request, dates already parsed.
#[derive(Debug, Clone)]
pub struct SubmitBookingRequest {
    pub room_id: uuid::Uuid,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub guests: i32,
}

pub struct BookingAdmissionService {
    rooms: Arc<RoomRepository>,
    bookings: Arc<BookingRepository>,
    config: AdmissionConfig,
}

impl BookingAdmissionService {
    pub fn new(
        rooms: Arc<RoomRepository>,
        bookings: Arc<BookingRepository>,
        config: AdmissionConfig,
    ) -> Self {
        Self {
            rooms,
            bookings,
            config,
        }
    }

    /// Admit a booking or fail with a typed error; nothing is written on
    /// any failure path.
    pub async fn submit_booking(
        &self,
        user_id: uuid::Uuid,
        request: SubmitBookingRequest,
    ) -> AppResult<Booking> {
        let room = self
            .rooms
            .find_by_uuid(request.room_id)
            .await?
            .ok_or_else(|| {
                AppError::domain(DomainError::RoomNotFound {
                    room_id: request.room_id.to_string(),
                })
            })?;

        if room.host_id == user_id {
            return Err(AppError::domain(DomainError::Forbidden {
                reason: "You cannot book your own room".to_string(),
            }));
        }

        validate_date_range(
            request.check_in,
            request.check_out,
            chrono::Utc::now().date_naive(),
        )?;

        if request.guests < 1 || request.guests > room.capacity {
            return Err(AppError::domain(DomainError::CapacityExceeded {
                requested: request.guests,
                capacity: room.capacity,
            }));
        }

        let total_price =
            compute_total_price(request.check_in, request.check_out, &room.price_per_night);

        let new = NewBooking {
            user_id,
            room_id: request.room_id,
            check_in: request.check_in,
            check_out: request.check_out,
            guests: request.guests,
            total_price,
        };

        match self
            .bookings
            .insert_if_vacant(&new, &self.config.blocking_strings())
            .await
        {
            Ok(AdmissionOutcome::Admitted(booking)) => {
                info!(
                    booking_id = %booking.id,
                    room_id = %booking.room_id,
                    check_in = %booking.check_in,
                    check_out = %booking.check_out,
                    total_price = %booking.total_price,
                    "booking admitted"
                );
                Ok(booking)
            }
            Ok(AdmissionOutcome::RoomMissing) => Err(AppError::domain(DomainError::RoomNotFound {
                room_id: request.room_id.to_string(),
            })),
            Ok(AdmissionOutcome::Overlap) => {
                info!(room_id = %request.room_id, "booking conflict on requested dates");
                Err(AppError::domain(DomainError::BookingConflict {
                    room_id: request.room_id.to_string(),
                }))
            }
            // A constraint rejection from the store is the same verdict
            // delivered by a different referee.
            Err(e) if e.is_constraint_violation() => {
                Err(AppError::domain(DomainError::BookingConflict {
                    room_id: request.room_id.to_string(),
                }))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Fetch one booking; only the owning user or an admin may view it.
    pub async fn get_booking(
        &self,
        booking_id: uuid::Uuid,
        requester: &AuthenticatedUser,
    ) -> AppResult<Booking> {
        let booking = self
            .bookings
            .find_by_uuid(booking_id)
            .await?
            .ok_or_else(|| {
                AppError::domain(DomainError::BookingNotFound {
                    booking_id: booking_id.to_string(),
                })
            })?;

        if !requester.may_view(booking.user_id) {
            return Err(AppError::domain(DomainError::Forbidden {
                reason: "Only the booking owner or an admin may view this booking".to_string(),
            }));
        }

        Ok(booking)
    }

    pub async fn list_bookings_for_user(&self, user_id: uuid::Uuid) -> AppResult<Vec<Booking>> {
        Ok(self.bookings.list_for_user(user_id).await?)
    }
}

/// Date sanity: check-out strictly after check-in, check-in not in the
/// past relative to `today`.
pub fn validate_date_range(
    check_in: NaiveDate,
    check_out: NaiveDate,
    today: NaiveDate,
) -> AppResult<()> {
    if check_out <= check_in {
        return Err(AppError::domain(DomainError::InvalidDateRange {
            reason: "check-out date must be after check-in date".to_string(),
        }));
    }
    if check_in < today {
        return Err(AppError::domain(DomainError::InvalidDateRange {
            reason: "check-in date cannot be in the past".to_string(),
        }));
    }
    Ok(())
}

/// Nights billed for a stay, floored at one night.
pub fn billable_nights(check_in: NaiveDate, check_out: NaiveDate) -> i64 {
    (check_out - check_in).num_days().max(1)
}

/// Total price: nights * nightly rate.
pub fn compute_total_price(
    check_in: NaiveDate,
    check_out: NaiveDate,
    price_per_night: &BigDecimal,
) -> BigDecimal {
    BigDecimal::from(billable_nights(check_in, check_out)) * price_per_night
}

/// Half-open overlap: `[a_start, a_end)` and `[b_start, b_end)` overlap
/// iff `a_start < b_end && b_start < a_end`. Adjacent stays (one ends
/// the day the other starts) do not overlap.
pub fn intervals_overlap(
    a_start: NaiveDate,
    a_end: NaiveDate,
    b_start: NaiveDate,
    b_end: NaiveDate,
) -> bool {
    a_start < b_end && b_start < a_end
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppErrorKind;
    use std::str::FromStr;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::from_str(s).unwrap()
    }

    fn assert_invalid_range(result: AppResult<()>) {
        let err = result.unwrap_err();
        assert!(matches!(
            err.kind,
            AppErrorKind::Domain(DomainError::InvalidDateRange { .. })
        ));
    }

    #[test]
    fn checkout_must_be_after_checkin() {
        let today = date("2026-03-01");
        assert_invalid_range(validate_date_range(
            date("2026-03-10"),
            date("2026-03-10"),
            today,
        ));
        assert_invalid_range(validate_date_range(
            date("2026-03-10"),
            date("2026-03-08"),
            today,
        ));
    }

    #[test]
    fn past_checkin_is_rejected() {
        let today = date("2026-03-01");
        assert_invalid_range(validate_date_range(
            date("2026-02-28"),
            date("2026-03-05"),
            today,
        ));
    }

    #[test]
    fn same_day_checkin_is_allowed() {
        let today = date("2026-03-01");
        assert!(validate_date_range(date("2026-03-01"), date("2026-03-02"), today).is_ok());
        assert!(validate_date_range(date("2026-03-05"), date("2026-03-08"), today).is_ok());
    }

    #[test]
    fn nights_are_floored_at_one() {
        assert_eq!(billable_nights(date("2026-03-01"), date("2026-03-03")), 2);
        assert_eq!(billable_nights(date("2026-03-01"), date("2026-03-02")), 1);
        // defensive floor; the date validation already forbids this shape
        assert_eq!(billable_nights(date("2026-03-03"), date("2026-03-01")), 1);
    }

    #[test]
    fn two_nights_at_1000_cost_2000() {
        let price = BigDecimal::from(1000);
        let total = compute_total_price(date("2026-03-01"), date("2026-03-03"), &price);
        assert_eq!(total, BigDecimal::from(2000));
    }

    #[test]
    fn overlap_predicate_matches_half_open_semantics() {
        let (a, b, c, d) = (
            date("2026-03-01"),
            date("2026-03-03"),
            date("2026-03-02"),
            date("2026-03-04"),
        );
        // partial overlap both directions
        assert!(intervals_overlap(a, b, c, d));
        assert!(intervals_overlap(c, d, a, b));
        // containment
        assert!(intervals_overlap(a, d, b, c));
        // adjacency is not a conflict: checkout day == next checkin day
        assert!(!intervals_overlap(a, b, b, d));
        assert!(!intervals_overlap(b, d, a, b));
        // disjoint
        assert!(!intervals_overlap(a, b, date("2026-03-10"), date("2026-03-12")));
    }

    #[test]
    fn blocking_statuses_default_to_pending_and_confirmed() {
        let config = AdmissionConfig::default();
        assert_eq!(
            config.blocking_statuses,
            vec![BookingStatus::Pending, BookingStatus::Confirmed]
        );
    }

    #[test]
    fn blocking_statuses_parse_from_list() {
        let config = AdmissionConfig::from_status_list("confirmed");
        assert_eq!(config.blocking_statuses, vec![BookingStatus::Confirmed]);

        let config = AdmissionConfig::from_status_list("pending, confirmed, pending");
        assert_eq!(
            config.blocking_statuses,
            vec![BookingStatus::Pending, BookingStatus::Confirmed]
        );
    }

    #[test]
    fn unknown_blocking_statuses_fall_back_to_default() {
        let config = AdmissionConfig::from_status_list("archived");
        assert_eq!(
            config.blocking_statuses,
            AdmissionConfig::default().blocking_statuses
        );
    }
}
