mod backup;
mod health;
mod init;
mod list;
mod restore;

pub use backup::*;
pub use health::*;
pub use init::*;
pub use list::*;
pub use restore::*;
