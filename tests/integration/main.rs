//! Integration tests for Reply-Harvest
//!
//! These tests use wiremock to stand in for the search API.

mod harvest_tests;
mod search_client_tests;
