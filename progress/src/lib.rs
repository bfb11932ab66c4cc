pub mod channel;
pub mod worker;

pub use channel::{progress_channel, ChannelProgressCallback, ProgressEvent};
pub use worker::{DeliveredProgress, ProgressWorker};
