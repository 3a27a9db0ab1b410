pub mod challenge;
pub mod gateway;
pub mod virtual_service;

// Re-export types
pub use challenge::{
    Challenge, ChallengeSpec, ChallengeStatus, IssuerRef, DOMAIN_LABEL_KEY, HTTP01,
    TOKEN_LABEL_KEY,
};
pub use gateway::{Gateway, GatewaySpec, Server, ServerPort, ServerTlsSettings};
pub use virtual_service::{
    Destination, HTTPMatchRequest, HTTPRoute, HTTPRouteDestination, PortSelector, StringMatch,
    VirtualService, VirtualServiceSpec,
};
