//! # Remote Catalog Interfaces
//!
//! Narrow seams to the remote catalog service: the JSON POST client, endpoint
//! resolution, typed request payloads and response inspection.

pub mod client;
pub mod endpoints;
pub mod payloads;
pub mod response;

pub use client::{RemoteApiClient, RemoteError};
pub use endpoints::{
    CachedEndpointResolver, EndpointResolver, EndpointSet, SettingsEndpointResolver,
};
pub use payloads::{
    AddressPayload, CustomerPayload, InventoryPayload, ProductPayload, RelationPayload,
    RemotePayload,
};
