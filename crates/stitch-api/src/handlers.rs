//! Request handlers.

pub mod health;
pub mod media;
pub mod oauth;
pub mod uploads;

pub use health::*;
pub use media::*;
pub use oauth::*;
pub use uploads::*;
