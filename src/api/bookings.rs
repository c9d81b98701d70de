//! Booking endpoints: POST /api/bookings, GET /api/bookings, GET /api/bookings/:id

use crate::database::booking_repository::Booking;
use crate::error::AppError;
use crate::middleware::auth::AuthenticatedUser;
use crate::services::booking_admission::{BookingAdmissionService, SubmitBookingRequest};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
pub struct BookingsState {
    pub admission: Arc<BookingAdmissionService>,
}

#[derive(Debug, Deserialize)]
pub struct SubmitBookingBody {
    pub room_id: Uuid,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub guests: i32,
}

#[derive(Debug, Serialize)]
pub struct BookingResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub room_id: Uuid,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub guests: i32,
    pub total_price: BigDecimal,
    pub status: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<Booking> for BookingResponse {
    fn from(booking: Booking) -> Self {
        Self {
            id: booking.id,
            user_id: booking.user_id,
            room_id: booking.room_id,
            check_in: booking.check_in,
            check_out: booking.check_out,
            guests: booking.guests,
            total_price: booking.total_price,
            status: booking.status,
            created_at: booking.created_at,
        }
    }
}

/// POST /api/bookings
pub async fn submit_booking(
    State(state): State<BookingsState>,
    requester: AuthenticatedUser,
    Json(body): Json<SubmitBookingBody>,
) -> Result<impl IntoResponse, AppError> {
    let booking = state
        .admission
        .submit_booking(
            requester.id,
            SubmitBookingRequest {
                room_id: body.room_id,
                check_in: body.check_in,
                check_out: body.check_out,
                guests: body.guests,
            },
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(BookingResponse::from(booking)),
    ))
}

/// GET /api/bookings: the requester's own bookings, newest first
pub async fn list_bookings(
    State(state): State<BookingsState>,
    requester: AuthenticatedUser,
) -> Result<Json<Vec<BookingResponse>>, AppError> {
    let bookings = state
        .admission
        .list_bookings_for_user(requester.id)
        .await?;
    Ok(Json(
        bookings.into_iter().map(BookingResponse::from).collect(),
    ))
}

/// GET /api/bookings/:id, owner or admin only
pub async fn get_booking(
    State(state): State<BookingsState>,
    requester: AuthenticatedUser,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<BookingResponse>, AppError> {
    let booking = state.admission.get_booking(booking_id, &requester).await?;
    Ok(Json(BookingResponse::from(booking)))
}
