//! Domain models with validation at construction
//!
//! All user input is validated when creating these types.
//! Invalid input returns ValidationError, not panic.

pub mod email;
pub mod enums;
pub mod name;
pub mod onboarding;
pub mod pagination;
pub mod password;
pub mod patch;
pub mod slug;
pub mod validation;
pub mod web;

pub use email::{optional_email, Email};
pub use enums::*;
pub use name::{optional_name, DisplayName};
pub use onboarding::OnboardingState;
pub use pagination::{Paginated, Pagination, PaginationParams};
pub use password::{Password, VerificationCode};
pub use patch::double_option;
pub use slug::Slug;
pub use validation::{bounded_text, in_range, non_negative_cents, ValidationError};
pub use web::{optional_url, HexColor, WebUrl};
