//! Stream combinators used by snapshot subscriptions

mod throttle;

pub use throttle::{Throttle, ThrottleExt};
