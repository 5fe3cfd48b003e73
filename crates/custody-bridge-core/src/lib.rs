pub mod bridge;
pub mod broker;
pub mod chains;
pub mod config;
pub mod domain;
pub mod error;
pub mod events;
pub mod legacy;
pub mod polling;
pub mod ports;
pub mod session;

pub use bridge::ChannelBridge;
pub use broker::{MethodKind, Provider};
pub use chains::{ChainInfo, ChainTable};
pub use config::{ChainIdInput, EnvOverrides, ProviderConfig, ProviderOptions};
pub use domain::{
    AuthorizationStatus, AuthzStatus, BatchResponse, ChannelMessage, FrameMessage, RequestEnvelope,
    RequestPayload, SignStatus, SurfaceId,
};
pub use error::ProviderError;
pub use events::{ProviderEvent, ProviderEventKind};
pub use legacy::{LegacyCall, LegacyCallback};
pub use ports::{
    ClockPort, HostProviderPort, MessageListener, NodePort, PortError, ServicePort, Subscription,
    SurfaceHost,
};
pub use session::{Session, SessionState};
