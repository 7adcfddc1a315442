pub mod alert;
pub mod autopilot;
pub mod order;
pub mod position;
pub mod settings;
pub mod signal;
