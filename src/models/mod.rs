pub mod booking;
pub mod event;
pub mod seat;
pub mod token;

pub use booking::{
    AttendeeInfo, Booking, BookingStatus, CheckInInfo, PaymentConfirmation, PaymentInfo,
    PaymentStatus, RefundDetails, SeatLine, SideEffect,
};
pub use event::{EventSeating, SeatMap};
pub use seat::{ClaimedSeats, InventoryCounters, ReleasedSeats, SeatRecord, SeatSpec, SeatStatus};
pub use token::{Token, TokenPayload};
