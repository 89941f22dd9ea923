// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Socket transport for the control plane: the wire protocol and
//! the Unix socket listeners that speak it.

pub mod protocol;
pub mod server;

pub use protocol::{CommandResponse, EventMessage, IncomingRequest, LegacyRequest, ProtocolError, TypedRequest};
pub use server::RpcServer;
