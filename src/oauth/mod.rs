pub mod grant;
pub mod guard;
pub mod identity;
pub mod reconcile;
pub mod redirect;
pub mod stats;
pub mod status;
