// SPDX-License-Identifier: MIT OR Apache-2.0
//! Change notifications emitted by a [`ProcessorNetwork`].
//!
//! Every structural mutation of the network queues one event. Observers receive
//! the queue synchronously and in order through
//! [`ProcessorNetwork::dispatch_events`].

use crate::connection::Connection;
use crate::link::PropertyLink;
use crate::network::ProcessorNetwork;
use crate::processor::ProcessorId;

/// A structural change of the network
#[derive(Debug, Clone, PartialEq)]
pub enum NetworkEvent {
    /// A processor was added
    ProcessorAdded(ProcessorId),
    /// A processor was removed; its connections and links were removed before
    ProcessorRemoved(ProcessorId),
    /// A processor was renamed
    ProcessorRenamed {
        /// Renamed processor
        processor: ProcessorId,
        /// Name before the change
        previous: String,
    },
    /// Two ports were connected
    ConnectionAdded(Connection),
    /// Two ports were disconnected
    ConnectionRemoved(Connection),
    /// A property link was created
    PropertyLinkAdded(PropertyLink),
    /// A property link was removed
    PropertyLinkRemoved(PropertyLink),
}

/// Receiver of network change events
pub trait NetworkObserver {
    /// Handle one event. `network` already reflects the change.
    fn network_changed(&mut self, network: &ProcessorNetwork, event: &NetworkEvent);
}

/// Observer that records every event it sees
#[derive(Debug, Default)]
pub struct EventLog {
    /// Received events in order
    pub events: Vec<NetworkEvent>,
}

impl NetworkObserver for EventLog {
    fn network_changed(&mut self, _network: &ProcessorNetwork, event: &NetworkEvent) {
        self.events.push(event.clone());
    }
}
