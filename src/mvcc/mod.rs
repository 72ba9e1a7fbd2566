pub mod controller;
pub mod lock;
