//! Compliance validation.

mod report;
mod validator;

pub use report::{checks, CheckResult, ComplianceReport};
pub use validator::{ComplianceSettings, ComplianceValidator};
