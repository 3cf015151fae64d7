//! Newtype wrappers for ids, money, emails, slugs and order statuses.

pub mod email;
pub mod id;
pub mod money;
pub mod slug;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use money::{MONEY_SCALE, Money, MoneyError};
pub use slug::Slug;
pub use status::{OrderEvent, OrderStatus};
