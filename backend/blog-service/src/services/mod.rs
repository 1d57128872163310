pub mod posts;
pub mod retry;
pub mod users;

pub use posts::{Clock, PostError, PostService, PostServiceConfig};
pub use retry::RetryConfig;
pub use users::{UserError, UserService};
