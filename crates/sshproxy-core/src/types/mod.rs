//! Domain types shared across the sshproxy workspace

pub mod directory;
pub mod events;
pub mod identifiers;
pub mod keypair;
pub mod remote;
pub mod status;

pub use directory::{bag_from, DataBag, Scope};
pub use events::{HandlerOutcome, HookEvent};
pub use identifiers::UnitId;
pub use keypair::Keypair;
pub use remote::{CommandOutput, RemoteTarget};
pub use status::UnitStatus;
