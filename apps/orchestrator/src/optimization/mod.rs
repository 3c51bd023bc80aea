pub mod language;
pub mod optimizer;
pub mod prompts;
pub mod schemas;
