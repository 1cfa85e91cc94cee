//! Request and response pipelines.
//!
//! Both are explicit, ordered stage lists. The request pipeline folds the
//! request through each stage; the response pipeline classifies the outcome,
//! drives 429 retries, and lets each stage observe the settled result.

pub mod request;
pub mod response;

pub use request::{RequestPipeline, RequestStage};
pub use response::{ResponsePipeline, ResponseStage, classify};
