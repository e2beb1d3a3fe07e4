//! Core HyParView-style membership protocol: active/passive view
//! management, bootstrap join, neighbour promotion, passive-view shuffle,
//! and failure recovery.
//!
//! This crate owns none of the transport, timer service, wire encoding,
//! configuration loading, or logging infrastructure a deployment needs —
//! those are external collaborators the caller supplies through the
//! [`Transport`] trait. See [`Engine`] for the entry point.

mod bootstrap;
mod config;
mod engine;
mod error;
mod message;
mod notification;
mod peer;
mod transport;
mod view;

pub use {
  config::Config,
  engine::Engine,
  error::Error,
  message::{ForwardJoin, Message, Neighbour, NeighbourReply, Shuffle, ShuffleReply, PROTOCOL_ID},
  notification::Notification,
  peer::{PeerId, PeerState},
  transport::{Timer, Transport, TransportEvent},
  view::View,
};
