//! CRUD and transactional operations against the SQLite schema
//! (`spec.md` §6), one flat `fn(pool: &SqlitePool, ...) -> Result<_, Error>`
//! per operation the way the teacher's `api/*.rs` modules are laid out.

pub mod admin;
pub mod card;
pub mod deck;
pub mod note;
pub mod review;
pub mod stats;
