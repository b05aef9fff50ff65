//! artacquire - artwork page acquisition through a logged-in browser session.
//!
//! The extraction core (`extract`) turns one artwork URL into a record by
//! driving a rendered page; the batch driver (`batch`) walks a backlog of
//! URLs and hands records to a sink (`storage`).

pub mod batch;
pub mod browser;
pub mod config;
pub mod extract;
pub mod models;
pub mod storage;
