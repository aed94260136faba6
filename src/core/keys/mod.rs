/*!
Key material management and key files.
*/

pub mod files;
pub mod manager;

pub use files::{
    load_keypair, load_public_key, load_secret_key, load_signature, save_keypair, save_signature, KeyLayout,
};
pub use manager::KeyManager;
