mod client;
mod retry;

pub use client::{
    BackendError, InferenceClient, InferenceRequest, SpeechBackend, SynthesisParams,
};
pub use retry::retry_fixed;
