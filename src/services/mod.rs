pub mod auth;
pub mod availability;
pub mod bookings;
pub mod email;
pub mod instagram;
pub mod payments;
pub mod rate_limit;
pub mod two_factor;
