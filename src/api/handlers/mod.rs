pub mod devices;
pub mod health;
pub mod patients;
pub mod temperature;
