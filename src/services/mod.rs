// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod access;
pub mod notifier;
pub mod token;

pub use access::{AccessService, ProfileAccess, RequestDetails};
pub use notifier::{ApprovalNotice, LogNotifier, Notifier, OwnerNotice, ResendNotifier};
pub use token::TokenIssuer;
