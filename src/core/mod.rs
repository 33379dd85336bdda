/*!
 * Event-to-upload pipeline
 */

pub mod filter;
pub mod naming;
pub mod pipeline;
pub mod queue;
pub mod watcher;
