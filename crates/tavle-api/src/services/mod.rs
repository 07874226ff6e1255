//! Service layer for business logic.

pub mod identity;
pub mod intake;
pub mod listing_cache;
pub mod moderation;
pub mod notify;

pub use identity::IdentityClient;
pub use intake::process_submission;
pub use listing_cache::{Clock, ListingCache, SystemClock};
pub use moderation::RecaptchaVerifier;
pub use notify::Notifier;
