pub mod echo;
pub mod gates;
pub mod grover;
pub mod hhl;
pub mod profile;
pub mod qaoa;
pub mod qec;
pub mod qml;
pub mod sequence;
pub mod shor;
pub mod state;
pub mod vqe;

pub use profile::EchoProfile;
pub use sequence::GateOp;
pub use state::QuantumState;
