//! Google Tasks from a query box, with the hard part done properly: the
//! OAuth 2.0 consent flow through an ephemeral local callback listener, and
//! the persistence and refresh of the resulting credentials.
//!
//! [`Authenticator::get_authenticated_client`] and [`Authenticator::sign_out`]
//! are the only entry points the task-management surface needs.

mod authenticator;
mod client;
mod config;
mod data;
mod due;
mod error;
mod listener;
mod tasks;
mod token;

pub use authenticator::{Authenticator, AuthorizedClient};
pub use client::{AuthorizationRequest, OAuthClient};
pub use config::OAuthConfig;
pub use data::{DataStore, PluginData};
pub use due::{format_short, parse_due_date};
pub use error::Error;
pub use listener::{CallbackListener, CallbackQuery};
pub use tasks::{Task, TaskList, TasksClient};
pub use token::{CredentialRecord, TokenStore};
