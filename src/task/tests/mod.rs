//! Unit and integration tests for task lifecycle management.

mod coordinator_tests;
