// Inline suggestion engine.
// Pure core: models, patch, resolver, rules, grouping, review, scoring.
// Async seams: generator (LLM via llm_client), store (Postgres + S3), handlers.

pub mod generator;
pub mod grouping;
pub mod handlers;
pub mod models;
pub mod patch;
pub mod prompts;
pub mod resolver;
pub mod review;
pub mod rules;
pub mod scoring;
pub mod store;
