pub mod message;
pub mod user;

pub use message::{Message, MessagePage, MAX_CONTENT_CHARS};
pub use user::{
    ProfilePicture, RegistrationProfile, User, UserResponse, CLEARANCE_DEFAULT,
    CLEARANCE_ELEVATED, STATUS_ACTIVE, STATUS_PENDING,
};
