//! Query functions, one module per table.

pub mod blocks;
pub mod join_requests;
pub mod memberships;
pub mod rings;
pub mod sites;
pub mod users;
