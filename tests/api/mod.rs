//! REST API Tests

mod chat_tests;
mod cluster_tests;
mod health_tests;
mod matching_tests;
