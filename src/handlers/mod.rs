pub mod admin;
pub mod auth;
pub mod blog;
pub mod bookings;
pub mod contact;
pub mod experiences;
pub mod extract;
pub mod health;
pub mod instagram;
pub mod payments;
