//! Core data models for the collection runner.

pub mod collection;
pub mod request;
pub mod response;
pub mod run;

pub use collection::{Collection, Folder, RequestDefinition};
pub use request::{BodyType, HeaderEntry, HttpMethod, ProxyRequest, RequestBody};
pub use response::ProxyResponse;
pub use run::{
    AssertionResult, RunIteration, RunRequest, RunResult, RunResultDetail, RunStatus,
};
