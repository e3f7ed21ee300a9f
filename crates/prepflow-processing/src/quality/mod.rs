//! Data quality audit: schema comparison and the rule-driven checker.

mod checker;
mod validator;

pub use checker::DataQualityChecker;
pub use validator::SchemaValidator;
