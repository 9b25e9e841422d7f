pub mod health;
pub mod socket;
