//! # Vistagen Engine
//!
//! The usage-gated generation pipeline: prompt enrichment, staggered
//! fan-out generation, quota-aware orchestration and video extension.
//!
//! ## Modules
//!
//! - `services`: External collaborators (Gemini client and mocks)
//! - `enrichment`: Prompt enrichment stage
//! - `fanout`: Staggered parallel artifact generation
//! - `orchestrator`: Request state machine and usage commit
//! - `video`: Bounded video extension
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use vistagen_engine::enrichment::EnrichmentStage;
//! use vistagen_engine::services::mock::MockEnrichmentService;
//!
//! # async fn example() {
//! let stage = EnrichmentStage::new(Arc::new(MockEnrichmentService::new()));
//! let brief = stage.enrich("a fisherman mending nets").await.unwrap();
//! println!("{}", brief.final_generation_prompt);
//! # }
//! ```

pub mod enrichment;
pub mod fanout;
pub mod orchestrator;
pub mod services;
pub mod video;
