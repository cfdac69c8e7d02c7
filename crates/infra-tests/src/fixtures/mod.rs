//! Fixtures for inspecting the runtimes behind applied environments.

pub mod docker;
pub mod kubectl;

pub use docker::DockerCli;
pub use kubectl::Kubectl;
