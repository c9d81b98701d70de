#[cfg(test)]
mod booking_admission_tests {
    use bigdecimal::BigDecimal;
    use chrono::{Duration, NaiveDate, Utc};
    use hostelpay_backend::database::booking_repository::BookingStatus;
    use hostelpay_backend::error::{AppErrorKind, DomainError};
    use hostelpay_backend::services::booking_admission::{
        billable_nights, compute_total_price, intervals_overlap, validate_date_range,
        AdmissionConfig,
    };

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn two_night_stay_on_capacity_two_room_costs_two_thousand() {
        // capacity 2, price 1000/night, check-in today+1, check-out today+3
        let today = Utc::now().date_naive();
        let check_in = today + Duration::days(1);
        let check_out = today + Duration::days(3);

        assert!(validate_date_range(check_in, check_out, today).is_ok());

        let price = BigDecimal::from(1000);
        assert_eq!(
            compute_total_price(check_in, check_out, &price),
            BigDecimal::from(2000)
        );
    }

    #[test]
    fn second_booking_overlapping_by_one_night_conflicts() {
        let today = Utc::now().date_naive();
        // first stay today+1 .. today+3, second today+2 .. today+4
        let first = (today + Duration::days(1), today + Duration::days(3));
        let second = (today + Duration::days(2), today + Duration::days(4));

        assert!(intervals_overlap(first.0, first.1, second.0, second.1));
    }

    #[test]
    fn back_to_back_stays_do_not_conflict() {
        let today = Utc::now().date_naive();
        let first = (today + Duration::days(1), today + Duration::days(3));
        let second = (today + Duration::days(3), today + Duration::days(5));

        assert!(!intervals_overlap(first.0, first.1, second.0, second.1));
    }

    #[test]
    fn yesterday_checkin_fails_invalid_date_range() {
        let today = Utc::now().date_naive();
        let result = validate_date_range(
            today - Duration::days(1),
            today + Duration::days(2),
            today,
        );
        let err = result.unwrap_err();
        assert!(matches!(
            err.kind,
            AppErrorKind::Domain(DomainError::InvalidDateRange { .. })
        ));
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn equal_and_reversed_dates_fail_for_any_range() {
        let today = date("2026-06-01");
        for (check_in, check_out) in [
            (date("2026-06-10"), date("2026-06-10")),
            (date("2026-06-12"), date("2026-06-10")),
        ] {
            let err = validate_date_range(check_in, check_out, today).unwrap_err();
            assert!(matches!(
                err.kind,
                AppErrorKind::Domain(DomainError::InvalidDateRange { .. })
            ));
        }
    }

    #[test]
    fn price_uses_max_of_one_night() {
        let price = BigDecimal::from(750);
        // the validation layer forbids zero-length stays, but pricing
        // still floors at one night
        assert_eq!(billable_nights(date("2026-06-10"), date("2026-06-10")), 1);
        assert_eq!(
            compute_total_price(date("2026-06-10"), date("2026-06-11"), &price),
            BigDecimal::from(750)
        );
        assert_eq!(
            compute_total_price(date("2026-06-10"), date("2026-06-17"), &price),
            BigDecimal::from(5250)
        );
    }

    #[test]
    fn no_two_blocking_intervals_may_overlap() {
        // pairwise property over a bundle of stays that were admitted
        // together: admitted stays must be mutually non-overlapping
        let admitted = [
            (date("2026-06-01"), date("2026-06-04")),
            (date("2026-06-04"), date("2026-06-07")),
            (date("2026-06-10"), date("2026-06-11")),
        ];
        for (i, a) in admitted.iter().enumerate() {
            for (j, b) in admitted.iter().enumerate() {
                if i != j {
                    assert!(
                        !intervals_overlap(a.0, a.1, b.0, b.1),
                        "stays {:?} and {:?} overlap",
                        a,
                        b
                    );
                }
            }
        }
    }

    #[test]
    fn blocking_set_is_a_configuration_point() {
        // default: an unpaid pending booking holds the dates
        let default = AdmissionConfig::default();
        assert!(default.blocking_statuses.contains(&BookingStatus::Pending));
        assert!(default
            .blocking_statuses
            .contains(&BookingStatus::Confirmed));

        // operators can narrow it to confirmed-only
        let narrowed = AdmissionConfig::from_status_list("confirmed");
        assert_eq!(narrowed.blocking_statuses, vec![BookingStatus::Confirmed]);

        // terminal non-blocking states never sneak in via config typos
        let fallback = AdmissionConfig::from_status_list("nonsense");
        assert_eq!(
            fallback.blocking_statuses,
            AdmissionConfig::default().blocking_statuses
        );
    }
}
