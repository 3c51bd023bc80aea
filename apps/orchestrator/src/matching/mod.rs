pub mod matcher;
pub mod similarity;
