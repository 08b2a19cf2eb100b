//! Service flows layered on the [`Backend`](crate::backend::Backend) trait.
//!
//! Each flow does the backend work, reports the outcome through a
//! [`Notifier`](crate::notify::Notifier), and returns a typed result for
//! callers that need more than a toast.

pub mod admin_reset;
pub mod forgot_password;
pub mod members;
pub mod reset_token;
