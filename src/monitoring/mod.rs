/*!
 * Monitoring
 * Logging setup for the lifecycle layer
 */

mod tracer;

pub use tracer::{init_tracing, init_tracing_with};
