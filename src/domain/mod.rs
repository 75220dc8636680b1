//! Domain rules: identifiers, timestamps, enums, validation.

pub mod ids;
pub mod payment_method;
pub mod timestamps;
pub mod validation;

pub use ids::{format_id, parse_id, IdKind};
pub use payment_method::PaymentMethod;
pub use timestamps::{next_updated_at, now_ts};
