mod role;
mod status;

pub use role::Role;
pub use status::ElectionStatus;
