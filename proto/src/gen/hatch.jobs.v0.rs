// @generated
/// A job is a single supervised command line running on the host.
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Job {
    #[prost(int32, tag="1")]
    pub id: i32,
    #[prost(string, repeated, tag="2")]
    pub cmd: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
    /// One of "unknown" | "running" | "stopped" | "exited".
    #[prost(string, tag="3")]
    pub status: ::prost::alloc::string::String,
}
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetRequest {
    #[prost(int32, tag="1")]
    pub id: i32,
}
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StartRequest {
    #[prost(string, repeated, tag="1")]
    pub cmd: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
    /// Zero means "use the server default".
    #[prost(int32, tag="2")]
    pub cpu_weight: i32,
    #[prost(int32, tag="3")]
    pub max_mem_use: i32,
    #[prost(int64, tag="4")]
    pub max_disk_io: i64,
}
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StopRequest {
    #[prost(int32, tag="1")]
    pub id: i32,
}
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StopResponse {
    #[prost(int32, tag="1")]
    pub exit_code: i32,
    #[prost(string, tag="2")]
    pub status: ::prost::alloc::string::String,
}
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StreamRequest {
    #[prost(int32, tag="1")]
    pub id: i32,
}
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StreamResponse {
    #[prost(bytes="vec", tag="1")]
    pub stream: ::prost::alloc::vec::Vec<u8>,
}
include!("hatch.jobs.v0.tonic.rs");
// @@protoc_insertion_point(module)
