pub mod booking;
pub mod ferry;
pub mod search;
pub mod seat;
pub mod session;

pub use booking::{BookingCallOutcome, BookingStatus, PaymentAttempt, PaymentStatus, ProviderBooking};
pub use ferry::{FerryOperator, UnifiedFerryResult};
pub use search::SearchParams;
pub use seat::{Seat, SeatLayout, SeatStatus};
pub use session::FerryBookingSession;
