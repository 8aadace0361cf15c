/// Action validation and submission
pub mod dispatcher;
/// Permission predicates shared by the dispatcher and presentation
pub mod permissions;
/// Pending actions, config and errors
pub mod types;

pub use dispatcher::ActionDispatcher;
pub use permissions::{CampaignPermissions, Permissions};
pub use types::{ActionConfig, ActionError, ActionKind, DEFAULT_CAMPAIGN_FEE, PendingAction};
