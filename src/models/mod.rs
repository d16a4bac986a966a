// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod event;
pub mod user;

pub use event::{plan_upsert, Event, EventDraft, UpsertAction};
pub use user::{LoginTokens, User, UserProfile};
