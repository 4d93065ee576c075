//! Cross-module test suites for the agent.

mod behaviour;
mod support;
