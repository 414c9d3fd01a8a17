pub mod poller;
pub mod reconciler;
pub mod revision;
pub mod scanner;
pub mod writer;

pub use reconciler::{Reconciled, Reconciler};
pub use revision::RevisionChange;
pub use scanner::{git_volumes, GitVolume};
pub use writer::{KubeWriter, WorkloadWriter};
