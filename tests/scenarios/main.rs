//! Scenario-based tests for the provisioning pipeline

mod helpers;

mod abort;
mod clean_run;
mod halt_and_clear;
mod retry_failed;
mod staggering;
