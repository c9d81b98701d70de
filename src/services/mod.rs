//! Services module for business logic

pub mod booking_admission;
pub mod payment_orchestrator;

pub use booking_admission::{AdmissionConfig, BookingAdmissionService, SubmitBookingRequest};
pub use payment_orchestrator::{CallbackOutcome, InitiatePaymentRequest, PaymentOrchestrator};
