pub mod coordinator;
pub mod fake_bpm;

pub use coordinator::ServiceCoordinator;
