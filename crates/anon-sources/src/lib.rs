//! Remote repository providers
//!
//! The engine reads repositories exclusively through [`RepositoryProvider`].
//! [`github::GithubProvider`] talks to the GitHub REST API;
//! [`memory::MemoryProvider`] serves fixed content for tests and demos.

pub mod github;
pub mod memory;
pub mod provider;

pub use github::GithubProvider;
pub use memory::MemoryProvider;
pub use provider::RepositoryProvider;
