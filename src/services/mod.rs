pub mod audit;
pub use audit::{AuditAction, AuditService};

pub mod auth_service;
pub use auth_service::{AuthError, AuthService, LoginOutcome, RegisterOutcome};

pub mod auth_service_impl;
pub use auth_service_impl::SeaOrmAuthService;

pub mod lockout;
pub use lockout::{LockState, LockoutPolicy};

pub mod sandbox;
pub use sandbox::{PathSandbox, SandboxError};

pub mod scan;
pub use scan::PayloadScanner;

pub mod token;
pub use token::{Claims, TokenError, TokenService};
