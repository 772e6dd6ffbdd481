// SPDX-License-Identifier: MIT OR Apache-2.0
//! Processor network model for `netweave`.
//!
//! A network is a dataflow graph of processors connected through typed ports,
//! plus a parallel graph of property links that propagate parameter values.
//!
//! ## Architecture
//!
//! - Processors own typed input/output ports and linkable properties
//! - Connections join an outport to a compatible inport
//! - Property links carry a [`LinkEvaluator`] that maps source to destination values
//! - Every structural change queues a [`NetworkEvent`] for observers
//! - Networks and their meta-data serialize to RON

pub mod port;
pub mod property;
pub mod processor;
pub mod connection;
pub mod link;
pub mod metadata;
pub mod event;
pub mod network;

pub use port::{Port, PortDirection, PortId, PortType};
pub use property::{Camera, Property, PropertyId, PropertyRef, PropertyValue};
pub use processor::{Processor, ProcessorCategory, ProcessorId, ProcessorRegistry, ProcessorType};
pub use connection::{Connection, ConnectionId};
pub use link::{LinkError, LinkEvaluator, PropertyLink, PropertyLinkId};
pub use metadata::{MetaDataContainer, MetaDataError, PositionMetaData, POSITION_KEY};
pub use event::{EventLog, NetworkEvent, NetworkObserver};
pub use network::{NetworkError, ProcessorNetwork};
