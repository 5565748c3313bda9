mod seed;
mod users;

pub use seed::cmd_seed;
pub use users::{cmd_users_list, cmd_users_unlock};
