pub mod api;
pub mod common;
pub mod db;
pub mod directory;
pub mod eligibility;
pub mod ledger;
pub mod mongodb;
