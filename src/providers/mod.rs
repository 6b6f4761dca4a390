// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! External collaborators reached over the network.

pub mod member_directory;

pub use member_directory::{HttpUserLookup, LookupError, UserLookup, UserRecord};
