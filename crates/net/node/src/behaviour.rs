//! Composed network behaviour.

use libp2p::{gossipsub, identify, identity::Keypair, ping, swarm::NetworkBehaviour};

use crate::{NetworkConfig, NodeError};

/// Network behaviour for a mesh node (pub/sub, identify, latency, direct streams).
#[derive(NetworkBehaviour)]
pub struct MeshBehaviour {
    /// Topic dissemination.
    pub gossipsub: gossipsub::Behaviour,
    /// Exchange listen addresses and supported protocols.
    pub identify: identify::Behaviour,
    /// Round-trip measurement.
    pub ping: ping::Behaviour,
    /// Raw streams on application-chosen protocols.
    pub stream: libp2p_stream::Behaviour,
}

impl MeshBehaviour {
    pub fn new(keypair: &Keypair, config: &NetworkConfig) -> Result<Self, NodeError> {
        let gossip_config = gossipsub::ConfigBuilder::default()
            .heartbeat_interval(config.heartbeat_interval)
            .validation_mode(gossipsub::ValidationMode::Strict)
            .build()
            .map_err(|e| NodeError::Behaviour(e.to_string()))?;

        let gossipsub = gossipsub::Behaviour::new(
            gossipsub::MessageAuthenticity::Signed(keypair.clone()),
            gossip_config,
        )
        .map_err(|e| NodeError::Behaviour(e.to_string()))?;

        let identify = identify::Behaviour::new(
            identify::Config::new(config.protocol_version.clone(), keypair.public())
                .with_agent_version(config.agent_version.clone()),
        );

        Ok(Self {
            gossipsub,
            identify,
            ping: ping::Behaviour::default(),
            stream: libp2p_stream::Behaviour::new(),
        })
    }
}
