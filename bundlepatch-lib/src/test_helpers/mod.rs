pub mod mock_backend;
pub mod recording_observer;
