pub mod metrics;
pub mod observed;


pub use metrics::FrictionMetrics;
pub use observed::ObservedEngine;
