pub mod analytics_event;
pub mod link;
pub mod user;

pub use analytics_event::Entity as AnalyticsEventEntity;
pub use link::Entity as LinkEntity;
pub use user::Entity as UserEntity;
