pub use super::audit_logs::Entity as AuditLogs;
pub use super::users::Entity as Users;
