pub mod loan;
pub mod ports;
pub mod reservation;
pub mod resource;
pub mod user;
