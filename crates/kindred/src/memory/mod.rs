pub mod context;
pub mod routing;
pub mod salience;
pub mod session;
pub mod types;

pub use context::ConversationContext;
pub use routing::{RoutedTurn, route_turn};
pub use session::SessionStore;
pub use types::{MemoryKind, MemoryRecord, OwnerId, OwnerIdError, SessionTurn};
