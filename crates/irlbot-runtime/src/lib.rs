//! # irlbot-runtime
//!
//! Everything with state and failure handling:
//!
//! - [`SessionOrchestrator`]: startup, periodic and notice-driven token
//!   renewal, single-flight session rebuild
//! - [`RenewalScheduler`]: the periodic timer the orchestrator owns
//! - [`SessionHolder`]: atomic owner of the live chat session
//! - [`CommandDispatcher`]: broadcaster-only start/stop commands
//! - [`Bot`]: the event loop tying chat events to the above

#![deny(unsafe_code)]

pub mod bot;
pub mod command;
pub mod dispatcher;
pub mod errors;
pub mod holder;
pub mod orchestrator;
pub mod scheduler;
pub mod settle;

pub use bot::{Bot, check_intro_scene};
pub use command::{CommandInvocation, Role};
pub use dispatcher::{BotCommand, CommandDispatcher, DispatchOutcome};
pub use errors::RuntimeError;
pub use holder::SessionHolder;
pub use orchestrator::{ReauthOutcome, SessionOrchestrator, SessionState};
pub use scheduler::RenewalScheduler;
pub use settle::{FixedDelay, SceneSettle};
