//! The libp2p swarm and its event loop.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use futures::StreamExt;
use libp2p::{
    Multiaddr, PeerId, Swarm, SwarmBuilder, gossipsub, identify, noise, ping,
    swarm::{SwarmEvent, dial_opts::DialOpts},
    tcp, yamux,
};
use meshlink_net_api::{OverlayError, PeerAddrInfo, TopicMessage};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, trace, warn};

use crate::{
    MeshBehaviour, MeshBehaviourEvent, NetworkConfig, NodeCommand, NodeError, NodeHandle,
    PeerBook,
};

type Reply = oneshot::Sender<Result<(), OverlayError>>;

/// One local subscription to a topic.
struct TopicSender {
    sender: mpsc::Sender<TopicMessage>,
    dropped: Arc<AtomicU64>,
}

/// Owner of the libp2p swarm.
///
/// Create one with [`NetworkNode::builder`], hand the returned
/// [`NodeHandle`] to whoever needs the overlay and spawn [`NetworkNode::run`].
pub struct NetworkNode {
    swarm: Swarm<MeshBehaviour>,
    commands: mpsc::UnboundedReceiver<NodeCommand>,
    peer_book: Arc<PeerBook>,
    listen_addrs: Vec<Multiaddr>,
    bootnodes: Vec<Multiaddr>,
    /// Callers waiting for a dial to a peer to resolve.
    pending_dials: HashMap<PeerId, Vec<Reply>>,
    /// Local subscriptions keyed by topic.
    subscribers: HashMap<gossipsub::TopicHash, Vec<TopicSender>>,
}

impl NetworkNode {
    /// Create a builder for constructing a NetworkNode.
    pub fn builder(config: NetworkConfig) -> NetworkNodeBuilder {
        NetworkNodeBuilder::new(config)
    }

    /// Get the local peer ID.
    pub fn local_peer_id(&self) -> &PeerId {
        self.swarm.local_peer_id()
    }

    /// Start listening on the configured addresses.
    ///
    /// Fails only if no address could be bound.
    pub fn start_listening(&mut self) -> Result<(), NodeError> {
        let mut listening = 0;
        for addr in &self.listen_addrs {
            match self.swarm.listen_on(addr.clone()) {
                Ok(_) => {
                    info!(%addr, "Listening on address");
                    listening += 1;
                }
                Err(e) => warn!(%addr, %e, "Failed to listen on address"),
            }
        }
        if listening == 0 && !self.listen_addrs.is_empty() {
            return Err(NodeError::Listen);
        }
        Ok(())
    }

    /// Dial the configured bootnodes. Failures are logged, not returned.
    pub fn connect_bootnodes(&mut self) -> usize {
        if self.bootnodes.is_empty() {
            return 0;
        }

        info!(count = self.bootnodes.len(), "Connecting to bootnodes...");
        let mut dialed = 0;
        for bootnode in self.bootnodes.clone() {
            match self.swarm.dial(bootnode.clone()) {
                Ok(()) => {
                    debug!(%bootnode, "Dial initiated");
                    dialed += 1;
                }
                Err(e) => warn!(%bootnode, %e, "Failed to dial bootnode"),
            }
        }
        dialed
    }

    /// Listen, dial bootnodes and run the event loop until shutdown.
    pub async fn run(mut self) -> Result<(), NodeError> {
        self.start_listening()?;
        self.connect_bootnodes();

        info!(peer_id = %self.swarm.local_peer_id(), "Starting network event loop");

        loop {
            tokio::select! {
                event = self.swarm.select_next_some() => {
                    self.handle_swarm_event(event);
                }

                command = self.commands.recv() => match command {
                    Some(NodeCommand::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },
            }
        }

        info!("Network event loop stopped");
        Ok(())
    }

    fn handle_command(&mut self, command: NodeCommand) {
        match command {
            NodeCommand::Dial { peer, reply } => self.dial(peer, reply),
            NodeCommand::Disconnect { peer, reply } => {
                // Not being connected is not an error: the end state is the same.
                if self.swarm.disconnect_peer_id(peer).is_err() {
                    debug!(%peer, "Disconnect requested for peer that is not connected");
                }
                let _ = reply.send(Ok(()));
            }
            NodeCommand::Subscribe {
                topic,
                sender,
                dropped,
                reply,
            } => {
                let _ = reply.send(self.subscribe(topic, TopicSender { sender, dropped }));
            }
            NodeCommand::Publish { topic, data, reply } => {
                let _ = reply.send(self.publish(topic, data));
            }
            NodeCommand::Shutdown => {}
        }
    }

    fn dial(&mut self, peer: PeerAddrInfo, reply: Reply) {
        let PeerAddrInfo { peer_id, addrs } = peer;

        if self.swarm.is_connected(&peer_id) {
            let _ = reply.send(Ok(()));
            return;
        }

        if let Some(waiting) = self.pending_dials.get_mut(&peer_id) {
            waiting.push(reply);
            return;
        }

        let opts = DialOpts::peer_id(peer_id).addresses(addrs).build();
        match self.swarm.dial(opts) {
            Ok(()) => {
                debug!(%peer_id, "Dial initiated");
                self.pending_dials.insert(peer_id, vec![reply]);
            }
            Err(e) => {
                debug!(%peer_id, %e, "Dial rejected");
                let _ = reply.send(Err(OverlayError::Dial(e.to_string())));
            }
        }
    }

    fn resolve_dial(&mut self, peer_id: &PeerId, result: Result<(), OverlayError>) {
        if let Some(waiting) = self.pending_dials.remove(peer_id) {
            for reply in waiting {
                let _ = reply.send(result.clone());
            }
        }
    }

    fn subscribe(&mut self, topic: String, subscriber: TopicSender) -> Result<(), OverlayError> {
        let ident = gossipsub::IdentTopic::new(topic);
        let hash = ident.hash();

        if !self.subscribers.contains_key(&hash) {
            self.swarm
                .behaviour_mut()
                .gossipsub
                .subscribe(&ident)
                .map_err(|e| OverlayError::Topic(e.to_string()))?;
            debug!(topic = %ident, "Subscribed to topic");
        }

        self.subscribers.entry(hash).or_default().push(subscriber);
        Ok(())
    }

    fn publish(&mut self, topic: String, data: Vec<u8>) -> Result<(), OverlayError> {
        let ident = gossipsub::IdentTopic::new(topic);
        let hash = ident.hash();

        let gossipsub = &mut self.swarm.behaviour_mut().gossipsub;
        let has_audience = gossipsub
            .all_peers()
            .any(|(_, topics)| topics.iter().any(|t| **t == hash));
        if !has_audience {
            // Nobody to deliver to yet; gossipsub would reject the publish.
            debug!(topic = %ident, "No subscribed peers, message not sent");
            return Ok(());
        }

        gossipsub
            .publish(ident, data)
            .map(|_| ())
            .map_err(|e| OverlayError::Publish(e.to_string()))
    }

    fn handle_swarm_event(&mut self, event: SwarmEvent<MeshBehaviourEvent>) {
        match event {
            SwarmEvent::NewListenAddr { address, .. } => {
                info!(%address, "New listen address");
                self.peer_book.add_listen_addr(address);
            }
            SwarmEvent::ExpiredListenAddr { address, .. } => {
                info!(%address, "Expired listen address");
                self.peer_book.remove_listen_addr(&address);
            }
            SwarmEvent::ConnectionEstablished {
                peer_id,
                endpoint,
                num_established,
                ..
            } => {
                debug!(
                    %peer_id,
                    endpoint = %endpoint.get_remote_address(),
                    num_established,
                    "Connection established"
                );
                self.peer_book
                    .on_connection_established(peer_id, endpoint.get_remote_address().clone());
                self.resolve_dial(&peer_id, Ok(()));
            }
            SwarmEvent::ConnectionClosed {
                peer_id,
                cause,
                num_established,
                ..
            } => {
                info!(%peer_id, num_established, cause = ?cause, "Connection closed");
                self.peer_book.on_connection_closed(&peer_id, num_established);
            }
            SwarmEvent::OutgoingConnectionError { peer_id, error, .. } => match peer_id {
                Some(peer_id) => {
                    warn!(%peer_id, %error, "Outgoing connection error");
                    if !self.swarm.is_connected(&peer_id) {
                        self.resolve_dial(&peer_id, Err(OverlayError::Dial(error.to_string())));
                    }
                }
                None => warn!(%error, "Outgoing connection error (unknown peer)"),
            },
            SwarmEvent::IncomingConnection {
                local_addr,
                send_back_addr,
                ..
            } => {
                debug!(%local_addr, %send_back_addr, "Incoming connection");
            }
            SwarmEvent::Behaviour(event) => self.handle_behaviour_event(event),
            _ => {}
        }
    }

    fn handle_behaviour_event(&mut self, event: MeshBehaviourEvent) {
        match event {
            MeshBehaviourEvent::Gossipsub(gossipsub::Event::Message {
                propagation_source,
                message,
                ..
            }) => {
                let origin = message.source.unwrap_or(propagation_source);
                self.route_topic_message(message.topic, origin, message.data);
            }
            MeshBehaviourEvent::Gossipsub(gossipsub::Event::Subscribed { peer_id, topic }) => {
                debug!(%peer_id, %topic, "Peer subscribed to topic");
            }
            MeshBehaviourEvent::Gossipsub(_) => {}
            MeshBehaviourEvent::Identify(identify::Event::Received { peer_id, info, .. }) => {
                debug!(
                    %peer_id,
                    protocol_version = %info.protocol_version,
                    agent_version = %info.agent_version,
                    "Received identify info"
                );
                let protocols = info.protocols.iter().map(ToString::to_string).collect();
                self.peer_book
                    .on_identify(peer_id, info.listen_addrs, protocols);
            }
            MeshBehaviourEvent::Identify(identify::Event::Error { peer_id, error, .. }) => {
                debug!(%peer_id, %error, "Identify error");
            }
            MeshBehaviourEvent::Identify(_) => {}
            MeshBehaviourEvent::Ping(ping::Event { peer, result, .. }) => match result {
                Ok(rtt) => {
                    trace!(%peer, ?rtt, "Ping");
                    self.peer_book.on_rtt(peer, rtt);
                }
                Err(e) => trace!(%peer, %e, "Ping failed"),
            },
            MeshBehaviourEvent::Stream(()) => {}
        }
    }

    fn route_topic_message(&mut self, hash: gossipsub::TopicHash, origin: PeerId, data: Vec<u8>) {
        let Some(subscribers) = self.subscribers.get_mut(&hash) else {
            trace!(topic = %hash, "Message for topic without local subscribers");
            return;
        };

        let message = TopicMessage {
            topic: hash.to_string(),
            origin,
            data,
        };

        subscribers.retain(|subscriber| match subscriber.sender.try_send(message.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                subscriber.dropped.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });

        if subscribers.is_empty() {
            self.subscribers.remove(&hash);
            let topic = gossipsub::IdentTopic::new(hash.to_string());
            let _ = self.swarm.behaviour_mut().gossipsub.unsubscribe(&topic);
            debug!(%topic, "Last local subscription dropped, unsubscribed");
        }
    }
}

/// Builder for [`NetworkNode`].
pub struct NetworkNodeBuilder {
    config: NetworkConfig,
}

impl NetworkNodeBuilder {
    pub fn new(config: NetworkConfig) -> Self {
        Self { config }
    }

    /// Build the swarm and return the node together with its handle.
    pub fn build(self) -> Result<(NetworkNode, NodeHandle), NodeError> {
        info!("Initializing P2P network...");

        let config = self.config;
        let mut swarm = SwarmBuilder::with_new_identity()
            .with_tokio()
            .with_tcp(
                tcp::Config::default(),
                noise::Config::new,
                yamux::Config::default,
            )
            .map_err(|e| NodeError::Transport(e.to_string()))?
            .with_dns()
            .map_err(|e| NodeError::Transport(e.to_string()))?
            .with_behaviour(|keypair| {
                MeshBehaviour::new(keypair, &config)
                    .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)
            })
            .map_err(|e| NodeError::Behaviour(e.to_string()))?
            .with_swarm_config(|cfg| cfg.with_idle_connection_timeout(config.idle_timeout))
            .build();

        let local_peer_id = *swarm.local_peer_id();
        info!(%local_peer_id, "Local peer ID");

        let control = swarm.behaviour_mut().stream.new_control();
        let peer_book = Arc::new(PeerBook::new());
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        let handle = NodeHandle::new(
            local_peer_id,
            command_tx,
            peer_book.clone(),
            control,
            config.subscription_buffer,
        );

        let node = NetworkNode {
            swarm,
            commands: command_rx,
            peer_book,
            listen_addrs: config.listen_addrs,
            bootnodes: config.bootnodes,
            pending_dials: HashMap::new(),
            subscribers: HashMap::new(),
        };

        Ok((node, handle))
    }
}
