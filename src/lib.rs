//! Relay Twitch EventSub webhook notifications to local realtime subscribers.
//!
//! The crate keeps a self-refreshing OAuth credential set for the platform, reconciles the
//! desired webhook subscriptions against what the platform reports, authenticates inbound
//! deliveries, and fans events out through an in-process [`bus::EventBus`].

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod api;
pub mod auth;
pub mod bus;
pub mod config;
pub mod credentials;
pub mod error;
pub mod http;
pub mod obs;
pub mod server;
pub mod store;
pub mod subscription;
pub mod webhook;

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use serde_json::Value;
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use oauth2;
pub use reqwest;
pub use url;
// The binary reports startup failures through color-eyre.
use color_eyre as _;
#[cfg(test)] use httpmock as _;
