//! Generative mining — discovers candidate history events via an LLM.

pub mod llm_miner;
pub mod miner;
pub mod probe;

pub use llm_miner::LlmMiner;
pub use miner::{CandidateEvent, EventMiner};
pub use probe::{HeadRequestProbe, ImageProbe};
