pub mod signer_guard;
