/*!
Cryptographic components for the PQC lab.

This module holds the algorithm catalog, the provider seam with its two
backends, the owned key-material types, the safe binding that ties them
together and the record cipher used after a handshake.
*/

// Algorithm catalog
pub mod registry;

// Foreign provider seam and discovery
pub mod provider;

// Owned keys, secrets and signatures
pub mod material;

// Length-checked operations over a provider
pub mod binding;

// Secure channel record cipher
pub mod cipher;

// Re-export frequently used types
pub use binding::PqcContext;
pub use material::{EncapsulationResult, Keypair, PublicKey, SecretKey, SharedSecret, Signature};
pub use provider::{Provider, ProviderOrigin, ProviderSettings};
pub use registry::{AlgorithmKind, AlgorithmSpec};
