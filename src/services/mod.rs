pub mod booking;
pub mod expiry;

pub use booking::{BookingService, NewBooking};
pub use expiry::{ExpiryReport, ExpiryService};
