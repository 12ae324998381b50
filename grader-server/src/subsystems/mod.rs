pub mod audio_source;
pub mod backends;
pub mod commands;
pub mod notifier;
pub mod pipeline;
pub mod storage;
pub mod store;
