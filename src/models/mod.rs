pub mod task;
pub mod team;
pub mod user;

pub use task::{Priority, Task, TaskStatus, TaskView, DEFAULT_CATEGORY};
pub use team::{Invitation, MemberView, PendingInvitation, Team, TeamMember, TeamRole, TeamView};
pub use user::{User, UserProfile, UserSummary};
