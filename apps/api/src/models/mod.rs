pub mod applicant;
pub mod application;
pub mod user;
