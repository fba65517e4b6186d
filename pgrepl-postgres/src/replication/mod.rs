pub mod replica_identity;
pub mod slots;
