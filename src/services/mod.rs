// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - sync engine and remote clients.

pub mod coordinator;
pub mod due;
pub mod home_assistant;
pub mod memory;
pub mod names;
pub mod pipeline;
pub mod remote;
pub mod resolver;
pub mod store;

pub use coordinator::{MutationCoordinator, MutationOutcome, MutationState};
pub use home_assistant::HomeAssistantClient;
pub use memory::InMemoryRemote;
pub use names::NameRotator;
pub use remote::{Addressing, RemoteService};
pub use resolver::{EntityResolver, Resolution};
pub use store::{ActivityStore, PushChannel, PushEvent, Subscription};
