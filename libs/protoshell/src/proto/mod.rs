// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Wire messages, mirrored by hand from `proto/shell_messages.proto`.

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Conf {
    #[prost(string, tag = "1")]
    pub key: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub value: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TaskComponentMapping {
    #[prost(int32, tag = "1")]
    pub task: i32,
    #[prost(string, tag = "2")]
    pub component: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Topology {
    #[prost(int32, tag = "1")]
    pub task_id: i32,
    #[prost(message, repeated, tag = "2")]
    pub task_component_mappings: ::prost::alloc::vec::Vec<TaskComponentMapping>,
}

/// First frame written to a freshly launched child.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Context {
    #[prost(string, tag = "1")]
    pub pid_dir: ::prost::alloc::string::String,
    #[prost(message, repeated, tag = "2")]
    pub confs: ::prost::alloc::vec::Vec<Conf>,
    #[prost(message, optional, tag = "3")]
    pub topology: ::core::option::Option<Topology>,
}

/// The child's answer to [`Context`].
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Pid {
    #[prost(int32, tag = "1")]
    pub pid: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TupleMetadata {
    #[prost(string, tag = "1")]
    pub id: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub comp: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub stream: ::prost::alloc::string::String,
    #[prost(int32, tag = "4")]
    pub task: i32,
}

/// A bolt input tuple on its way to the child.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TupleProto {
    #[prost(message, optional, tag = "1")]
    pub tuple_metadata: ::core::option::Option<TupleMetadata>,
    #[prost(bytes = "vec", repeated, tag = "2")]
    pub contents: ::prost::alloc::vec::Vec<::prost::alloc::vec::Vec<u8>>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SpoutMsg {
    #[prost(string, tag = "1")]
    pub command: ::prost::alloc::string::String,
    #[prost(string, optional, tag = "2")]
    pub id: ::core::option::Option<::prost::alloc::string::String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct EmissionMetadata {
    #[prost(string, tag = "1")]
    pub command: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub id: ::prost::alloc::string::String,
    #[prost(string, repeated, tag = "3")]
    pub anchors: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
    #[prost(string, optional, tag = "4")]
    pub stream: ::core::option::Option<::prost::alloc::string::String>,
    #[prost(int64, optional, tag = "5")]
    pub task: ::core::option::Option<i64>,
    #[prost(bool, optional, tag = "6")]
    pub need_task_ids: ::core::option::Option<bool>,
    #[prost(string, tag = "7")]
    pub msg: ::prost::alloc::string::String,
}

/// Everything the child writes after the handshake.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct EmissionProto {
    #[prost(message, optional, tag = "1")]
    pub emission_metadata: ::core::option::Option<EmissionMetadata>,
    #[prost(bytes = "vec", repeated, tag = "2")]
    pub contents: ::prost::alloc::vec::Vec<::prost::alloc::vec::Vec<u8>>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TaskIds {
    #[prost(int32, repeated, tag = "1")]
    pub task_ids: ::prost::alloc::vec::Vec<i32>,
}
