//! Who is acting: closed role set, per-role capabilities, and the owned session context.

mod actor;
mod role;
mod session;

pub use actor::{Actor, UserId, BRANCH_HEADER, ROLE_HEADER, USER_HEADER};
pub use role::{NavItem, Role};
pub use session::{SessionContext, SessionError, SessionSummary};
