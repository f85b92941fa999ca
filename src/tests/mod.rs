//! Cross-component scenario tests.

mod integration_tests;
