//! # memberdash
//!
//! Client layer for the membership dashboard. Business logic (password
//! hashing, token validation, role lookup, payment queries) lives in the
//! hosted backend; this crate decides what a session may reach and drives the
//! auth, password-reset, and member-record flows against that backend.
//!
//! ARCHITECTURE
//! ============
//! - `access`: roles, the pure access policy, the static navigation model.
//! - `guard`: route guard state machine fed by path changes and tab requests.
//! - `context`: injectable owner of session + roles + guard; events are
//!   dispatched synchronously in arrival order.
//! - `backend`: HTTP client for the hosted auth/REST/RPC API.
//! - `services`: reset tokens, forgot-password, admin reset, member records.

pub mod access;
pub mod backend;
pub mod context;
pub mod guard;
pub mod history;
pub mod notify;
pub mod services;
pub mod session;
