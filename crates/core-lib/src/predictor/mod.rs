//! Forecasting pipeline: autoregression, constraints, trend and event adjustment

mod adjustment;
mod constraints;
mod forecaster;
mod trend;


pub use adjustment::EventAdjuster;
pub use constraints::ConstraintEnforcer;
pub use forecaster::{validate_history, AutoregressiveForecaster};
pub use trend::{linear_regression_slope, TrendAnalyzer};
