pub mod pipeline_tests;
pub mod concurrency_tests;
