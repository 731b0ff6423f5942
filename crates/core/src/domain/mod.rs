pub mod contact;
pub mod result;
