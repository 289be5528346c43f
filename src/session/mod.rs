// Session management module
// Provides the throttled session registry and its expiration sweeper

pub mod clock;
pub mod error;
pub mod manager;
pub mod storage;
pub mod sweeper;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::SessionError;
pub use manager::{SessionManager, SessionManagerState};
pub use storage::SessionRegistry;
pub use sweeper::{SweeperHandle, spawn_sweeper};
pub use types::{SessionConfig, SessionEntry, SessionInfo, SessionState, SessionStats};
