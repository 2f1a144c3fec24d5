pub mod blog;
pub mod booking;
pub mod contact;
pub mod experience;
pub mod instagram;
pub mod payment;
pub mod user;

pub use blog::{Category, CategoryRef, CategoryWithCount, Post};
pub use booking::{Booking, BookingDetails, BookingStatus, DateSummary, ExperienceSummary};
pub use contact::{ContactForm, ContactKind};
pub use experience::{
    DateWithAvailability, Difficulty, Experience, ExperienceCategory, ExperienceDate, Testimonial,
};
pub use instagram::{InstagramPost, RemoteMedia};
pub use payment::{
    EventOutcome, NewPaymentIntent, PaymentIntent, PaymentIntentObject, Refund, WebhookEvent,
};
pub use user::{Role, User, UserProfile};
