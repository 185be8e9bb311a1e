pub mod dispatch;
pub mod pricing;
pub mod registry;
pub mod simulator;
pub mod trip_state;
