pub mod dispatcher;
pub mod expiry_monitor;
pub mod loans;
pub mod locks;
pub mod reservation_monitor;
pub mod reservations;
pub mod service;
