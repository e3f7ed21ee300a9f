//! Text and JSON rendering of quality, preprocessing, feature and sweep reports.
//!
//! # Example
//!
//! ```rust,ignore
//! use prepflow_processing::reporting::ReportGenerator;
//!
//! let generator = ReportGenerator::new("outputs");
//! let text = generator.render_quality(&outcome.report, "Heart Disease Dataset");
//! generator.save_text(&text, "heart_quality.txt")?;
//! generator.save_json(&outcome.report, "heart_quality.json")?;
//! ```

mod generator;

pub use generator::ReportGenerator;
