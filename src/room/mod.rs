// Public API - what other modules can use
pub use handlers::list_rooms;
pub use manager::RoomManager;
pub use models::{Room, RoomCounts, RoomStatus};
pub use types::RoomSummary;

// Internal modules
mod handlers;
mod manager;
pub mod models;
mod types;
