//! M-Pesa gateway integration

pub mod daraja;
pub mod error;
pub mod types;
pub mod utils;

pub use daraja::{DarajaClient, DarajaConfig, StkPushAcceptance, StkPushParams};
pub use error::{PaymentError, PaymentResult};
