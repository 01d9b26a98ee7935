//! Integration tests for the built-in models and the model algebra

mod algebra_tests;
mod registry_tests;
mod teixeira_tests;
