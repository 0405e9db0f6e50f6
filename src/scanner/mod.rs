mod coordinator;

pub use coordinator::ScanCoordinator;
